//! `users.get` helpers and the lazy user handle given to listeners.

use std::fmt;
use std::sync::Arc;

use dbot_core::{request_as, ApiTransport, DbotError, Result};
use serde_json::json;
use tracing::debug;

use crate::types::{Message, User};

/// Fetches one user. `fields` are extra profile fields (e.g. `screen_name`, `photo_100`).
pub async fn get_user(api: &dyn ApiTransport, user_id: i64, fields: &[&str]) -> Result<User> {
    let mut params = json!({ "user_ids": user_id });
    if !fields.is_empty() {
        params["fields"] = json!(fields);
    }
    debug!(user_id, "step: users.get");
    let users: Vec<User> = request_as(api, "users.get", params).await?;
    users
        .into_iter()
        .next()
        .ok_or_else(|| DbotError::Decode(format!("users.get returned no user {}", user_id)))
}

/// Fetches the author of `message`.
pub async fn get_sender(api: &dyn ApiTransport, message: &Message, fields: &[&str]) -> Result<User> {
    get_user(api, message.from_id, fields).await
}

/// Looks a user up only when [`UserResolver::get`] is awaited.
#[derive(Clone)]
pub struct UserResolver {
    api: Arc<dyn ApiTransport>,
    user_id: i64,
}

impl fmt::Debug for UserResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserResolver")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl PartialEq for UserResolver {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl UserResolver {
    pub fn new(api: Arc<dyn ApiTransport>, user_id: i64) -> Self {
        Self { api, user_id }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub async fn get(&self, fields: &[&str]) -> Result<User> {
        get_user(self.api.as_ref(), self.user_id, fields).await
    }
}
