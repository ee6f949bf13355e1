//! VK API transport over reqwest: form-encoded method calls and Bots Long Poll checks.

use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{ApiTransport, DbotError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::VkConfig;
use crate::types::{ApiError, LongPollResponse, LongPollSession};

const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Clone)]
pub struct VkClient {
    http: Client,
    api_url: String,
    token: String,
    api_version: String,
    lang: String,
}

/// Flattens JSON params into form fields: nulls dropped, arrays joined with `,`, strings as-is,
/// anything else JSON-encoded.
pub fn form_fields(params: &Value) -> Result<Vec<(String, String)>> {
    let map = match params {
        Value::Object(map) => map,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(DbotError::Decode(format!(
                "VK params must be an object, got {}",
                other
            )))
        }
    };
    Ok(map
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), form_value(value)))
        .collect())
}

fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

impl VkClient {
    pub fn new(config: &VkConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.wait + HTTP_TIMEOUT_SLACK)
            .build()
            .map_err(|e| DbotError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            api_version: config.api_version.clone(),
            lang: config.lang.clone(),
        })
    }

    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }

    /// One `a_check` request against the session's server.
    #[instrument(skip(self, session), fields(ts = %session.ts))]
    pub async fn check(&self, session: &LongPollSession, wait: Duration) -> Result<LongPollResponse> {
        let wait = wait.as_secs().to_string();
        let response = self
            .http
            .get(session.server.as_str())
            .query(&[
                ("act", "a_check"),
                ("key", session.key.as_str()),
                ("ts", session.ts.as_str()),
                ("wait", wait.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DbotError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DbotError::Transport(format!("long poll HTTP {}", status)));
        }
        let body = response
            .text()
            .await
            .map_err(|e| DbotError::Transport(e.without_url().to_string()))?;
        serde_json::from_str(&body).map_err(|e| DbotError::Decode(format!("a_check: {}", e)))
    }
}

#[async_trait]
impl ApiTransport for VkClient {
    #[instrument(skip(self, params), fields(method = %method))]
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let mut form = form_fields(&params)?;
        form.push(("access_token".to_string(), self.token.clone()));
        form.push(("v".to_string(), self.api_version.clone()));
        form.push(("lang".to_string(), self.lang.clone()));
        debug!("step: vk request");

        let response = self
            .http
            .post(self.endpoint(method))
            .form(&form)
            .send()
            .await
            .map_err(|e| DbotError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DbotError::Transport(e.without_url().to_string()))?;
        if !status.is_success() {
            return Err(DbotError::Transport(format!("HTTP {}", status)));
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| DbotError::Decode(format!("{}: {}", method, e)))?;
        if let Some(error) = envelope.error {
            warn!(code = error.error_code, description = %error.error_msg, "vk API error");
            return Err(DbotError::Api {
                code: error.error_code,
                description: error.error_msg,
            });
        }
        envelope
            .response
            .ok_or_else(|| DbotError::Decode(format!("{}: neither response nor error", method)))
    }
}
