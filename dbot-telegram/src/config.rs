//! Telegram connection config: token, API URL, long-poll timeout, log path.
//! Loaded from env: BOT_TOKEN, TELEGRAM_API_URL, TELEGRAM_POLL_TIMEOUT_SECS, LOG_FILE.

use anyhow::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// BOT_TOKEN
    pub bot_token: String,
    /// TELEGRAM_API_URL, without trailing slash
    pub api_url: String,
    /// `timeout` passed to getUpdates
    pub poll_timeout: Duration,
    /// LOG_FILE
    pub log_file: Option<String>,
}

impl TelegramConfig {
    /// Load from environment variables. `token` overrides BOT_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?,
        };
        let api_url = env::var("TELEGRAM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let poll_timeout_secs = env::var("TELEGRAM_POLL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
        let log_file = env::var("LOG_FILE").ok();

        let config = Self {
            bot_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            log_file,
        };
        config.validate()?;
        Ok(config)
    }

    /// Given token, default API URL and timeout.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            log_file: None,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Token must be non-empty and api_url a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        if reqwest::Url::parse(&self.api_url).is_err() {
            anyhow::bail!("TELEGRAM_API_URL is not a valid URL: {}", self.api_url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var("BOT_TOKEN");
        env::remove_var("TELEGRAM_API_URL");
        env::remove_var("TELEGRAM_POLL_TIMEOUT_SECS");
        env::remove_var("LOG_FILE");
    }

    #[test]
    fn test_with_token() {
        let config = TelegramConfig::with_token("test_token");
        assert_eq!(config.bot_token, "test_token");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_token_and_bad_url() {
        assert!(TelegramConfig::with_token("").validate().is_err());
        assert!(TelegramConfig::with_token("t")
            .with_api_url("not a url")
            .validate()
            .is_err());
        assert!(TelegramConfig::with_token("t").validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        clear_env();
        env::set_var("BOT_TOKEN", "env_token");

        let config = TelegramConfig::load(None).unwrap();

        assert_eq!(config.bot_token, "env_token");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_timeout, Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_custom_values_and_token_override() {
        clear_env();
        env::set_var("BOT_TOKEN", "env_token");
        env::set_var("TELEGRAM_API_URL", "http://127.0.0.1:8081/");
        env::set_var("TELEGRAM_POLL_TIMEOUT_SECS", "5");
        env::set_var("LOG_FILE", "logs/test.log");

        let config = TelegramConfig::load(Some("cli_token".into())).unwrap();

        assert_eq!(config.bot_token, "cli_token");
        assert_eq!(config.api_url, "http://127.0.0.1:8081");
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.log_file.as_deref(), Some("logs/test.log"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_without_token_fails() {
        clear_env();
        assert!(TelegramConfig::load(None).is_err());
    }
}
