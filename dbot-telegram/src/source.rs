//! `getUpdates` long-poll source. The cursor is the next offset: last `update_id + 1`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{Batch, Result, UpdateSource};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::TelegramClient;
use crate::types::Update;

pub struct TelegramSource {
    client: Arc<TelegramClient>,
    timeout: Duration,
}

impl TelegramSource {
    pub fn new(client: Arc<TelegramClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

/// Decodes one `getUpdates` result item by item. Items that fail to decode are logged and
/// skipped; the returned id is the highest `update_id` seen, skipped items included.
pub fn decode_updates(items: Vec<Value>) -> (Vec<Update>, Option<i64>) {
    let mut last_update_id = None;
    let mut updates = Vec::with_capacity(items.len());
    for item in items {
        let update_id = item.get("update_id").and_then(Value::as_i64);
        last_update_id = last_update_id.max(update_id);
        match serde_json::from_value::<Update>(item) {
            Ok(update) => updates.push(update),
            Err(e) => warn!(update_id = ?update_id, error = %e, "skipping undecodable update"),
        }
    }
    (updates, last_update_id)
}

/// Offset to request next; unchanged when the batch carried no ids.
pub fn next_offset(current: Option<i64>, last_update_id: Option<i64>) -> Option<i64> {
    last_update_id.map(|id| id + 1).or(current)
}

#[async_trait]
impl UpdateSource for TelegramSource {
    type Cursor = Option<i64>;
    type Update = Update;

    async fn init(&self) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn fetch(&self, cursor: &Option<i64>) -> Result<Batch<Option<i64>, Update>> {
        let items = self.client.get_updates(*cursor, self.timeout).await?;
        let (updates, last_update_id) = decode_updates(items);
        let next = next_offset(*cursor, last_update_id);
        debug!(count = updates.len(), next_offset = ?next, "step: getUpdates");
        Ok(Batch::new(next, updates))
    }
}
