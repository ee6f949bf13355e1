//! Transport abstractions consumed by the engine.
//!
//! [`ApiTransport`] issues one platform method call; [`UpdateSource`] yields batches of updates for
//! a cursor. Concrete HTTP implementations live in the platform crates; tests substitute stubs.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DbotError, Result};

/// Calls a platform API method with JSON params and returns the unwrapped `result` payload.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Calls `method` and deserializes the payload into `T`.
pub async fn request_as<T: DeserializeOwned>(
    api: &dyn ApiTransport,
    method: &str,
    params: Value,
) -> Result<T> {
    let value = api.request(method, params).await?;
    serde_json::from_value(value).map_err(|e| DbotError::Decode(format!("{}: {}", method, e)))
}

/// One fetch response: the cursor to use next and the updates it carried (possibly none).
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<C, U> {
    pub next_cursor: C,
    pub items: Vec<U>,
}

impl<C, U> Batch<C, U> {
    pub fn new(next_cursor: C, items: Vec<U>) -> Self {
        Self { next_cursor, items }
    }

    pub fn empty(next_cursor: C) -> Self {
        Self {
            next_cursor,
            items: Vec::new(),
        }
    }
}

/// Cursor-based long-poll source of updates.
#[async_trait]
pub trait UpdateSource: Send + Sync + 'static {
    type Cursor: Clone + Debug + Send + Sync + 'static;
    type Update: Send + Sync + 'static;

    /// Produces the starting cursor. Session-oriented sources perform their init call here.
    async fn init(&self) -> Result<Self::Cursor>;

    /// Issues one long-wait fetch for `cursor`.
    async fn fetch(&self, cursor: &Self::Cursor) -> Result<Batch<Self::Cursor, Self::Update>>;
}
