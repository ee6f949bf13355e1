//! VK API payloads used by the Bots Long Poll engine.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub date: i64,
    pub peer_id: i64,
    pub from_id: i64,
    #[serde(default)]
    pub out: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub conversation_message_id: i64,
    #[serde(default)]
    pub fwd_messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_id: Option<i64>,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_author_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Client capabilities sent with `message_new` (API 5.103+).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub button_actions: Vec<String>,
    #[serde(default)]
    pub keyboard: bool,
    #[serde(default)]
    pub inline_keyboard: bool,
    #[serde(default)]
    pub carousel: bool,
    #[serde(default)]
    pub lang_id: i64,
}

/// `users.get` item. Fields requested through `fields` land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_access_closed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One long-poll event. `object` stays raw: its shape depends on `type`, and unknown types are kept
/// as they came.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub object: Value,
    #[serde(default)]
    pub group_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl UpdateItem {
    pub fn new(kind: impl Into<String>, object: Value) -> Self {
        Self {
            kind: kind.into(),
            object,
            group_id: 0,
            event_id: None,
        }
    }
}

/// Current `message_new` object shape.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageNew {
    pub message: Message,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Bots Long Poll session: where to poll, with which key, from which position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongPollSession {
    pub server: String,
    pub key: String,
    #[serde(deserialize_with = "string_or_number")]
    pub ts: String,
}

/// `a_check` response. `failed` is set instead of `updates` when the session needs attention.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LongPollResponse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub ts: Option<String>,
    #[serde(default)]
    pub updates: Vec<UpdateItem>,
    #[serde(default)]
    pub failed: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub error_code: i64,
    #[serde(alias = "error_message", default)]
    pub error_msg: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

// `ts` is a string from getLongPollServer but a number in some `failed` responses.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}
