//! Telegram Bot API transport over reqwest.
//!
//! Every method is a JSON POST to `{api_url}/bot{token}/{method}`; the response envelope
//! `{ok, result, description, error_code}` is unwrapped here so callers only see `result`.

use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{request_as, ApiTransport, DbotError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::TelegramConfig;
use crate::types::Message;

/// Slack on top of the long-poll timeout before the HTTP request itself gives up.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.poll_timeout + HTTP_TIMEOUT_SLACK)
            .build()
            .map_err(|e| DbotError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token: config.bot_token.clone(),
        })
    }

    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Prefix of file download URLs: `{api_url}/file/bot{token}`.
    pub fn file_base(&self) -> String {
        format!("{}/file/bot{}", self.api_url, self.token)
    }

    /// `getUpdates`; `offset` is omitted when `None`. Items are returned undecoded.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Value>> {
        let mut params = json!({ "timeout": timeout.as_secs() });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }
        request_as(self, "getUpdates", params).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        request_as(self, "sendMessage", json!({ "chat_id": chat_id, "text": text })).await
    }
}

#[async_trait]
impl ApiTransport for TelegramClient {
    #[instrument(skip(self, params), fields(method = %method))]
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        debug!("step: telegram request");
        let response = self
            .http
            .post(self.endpoint(method))
            .json(&params)
            .send()
            .await
            .map_err(|e| DbotError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DbotError::Transport(e.without_url().to_string()))?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(DbotError::Transport(format!("HTTP {}", status)));
            }
            Err(e) => return Err(DbotError::Decode(format!("{}: {}", method, e))),
        };

        if !envelope.ok {
            let code = envelope.error_code.unwrap_or_else(|| i64::from(status.as_u16()));
            let description = envelope.description.unwrap_or_default();
            warn!(code, description = %description, "telegram API error");
            return Err(DbotError::Api { code, description });
        }

        envelope
            .result
            .ok_or_else(|| DbotError::Decode(format!("{}: envelope without result", method)))
    }
}
