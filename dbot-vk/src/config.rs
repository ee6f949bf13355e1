//! VK community bot config.
//! Loaded from env: VK_TOKEN, VK_GROUP_ID, VK_API_URL, VK_API_VERSION, VK_LANG, VK_WAIT_SECS, LOG_FILE.

use anyhow::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.vk.com/method";
pub const DEFAULT_API_VERSION: &str = "5.103";
pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_WAIT_SECS: u64 = 25;

#[derive(Debug, Clone)]
pub struct VkConfig {
    /// VK_TOKEN, community access token
    pub token: String,
    /// VK_GROUP_ID, must be positive
    pub group_id: i64,
    pub api_url: String,
    /// Sent as `v` with every call
    pub api_version: String,
    /// Sent as `lang` with every call
    pub lang: String,
    /// `wait` of the long-poll request
    pub wait: Duration,
    pub log_file: Option<String>,
}

impl VkConfig {
    /// Load from environment variables. `token` overrides VK_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let token = match token {
            Some(token) => token,
            None => env::var("VK_TOKEN").map_err(|_| anyhow::anyhow!("VK_TOKEN not set"))?,
        };
        let group_id = env::var("VK_GROUP_ID")
            .map_err(|_| anyhow::anyhow!("VK_GROUP_ID not set"))?
            .trim()
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("VK_GROUP_ID is not a number: {}", e))?;
        let wait_secs = env::var("VK_WAIT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WAIT_SECS);

        let config = Self {
            token,
            group_id,
            api_url: env::var("VK_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_version: env::var("VK_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            lang: env::var("VK_LANG").unwrap_or_else(|_| DEFAULT_LANG.to_string()),
            wait: Duration::from_secs(wait_secs),
            log_file: env::var("LOG_FILE").ok(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn new(token: impl Into<String>, group_id: i64) -> Self {
        Self {
            token: token.into(),
            group_id,
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            lang: DEFAULT_LANG.to_string(),
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            log_file: None,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            anyhow::bail!("VK token is empty");
        }
        if self.group_id <= 0 {
            anyhow::bail!("VK_GROUP_ID must be positive, got {}", self.group_id);
        }
        if reqwest::Url::parse(&self.api_url).is_err() {
            anyhow::bail!("VK_API_URL is not a valid URL: {}", self.api_url);
        }
        Ok(())
    }
}
