//! Bots Long Poll source. The cursor is the whole session: server, key and `ts`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{request_as, Batch, DbotError, Result, UpdateSource};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::client::VkClient;
use crate::types::{LongPollSession, UpdateItem};

pub struct VkSource {
    client: Arc<VkClient>,
    group_id: i64,
    wait: Duration,
}

impl VkSource {
    pub fn new(client: Arc<VkClient>, group_id: i64, wait: Duration) -> Self {
        Self {
            client,
            group_id,
            wait,
        }
    }

    /// `groups.getLongPollServer` for this community.
    pub async fn request_session(&self) -> Result<LongPollSession> {
        request_as(
            self.client.as_ref(),
            "groups.getLongPollServer",
            json!({ "group_id": self.group_id }),
        )
        .await
    }
}

#[async_trait]
impl UpdateSource for VkSource {
    type Cursor = LongPollSession;
    type Update = UpdateItem;

    async fn init(&self) -> Result<LongPollSession> {
        let session = self.request_session().await?;
        info!(server = %session.server, ts = %session.ts, "step: long poll session obtained");
        Ok(session)
    }

    async fn fetch(&self, session: &LongPollSession) -> Result<Batch<LongPollSession, UpdateItem>> {
        let response = self.client.check(session, self.wait).await?;
        match response.failed {
            None => {
                let next = LongPollSession {
                    ts: response.ts.unwrap_or_else(|| session.ts.clone()),
                    ..session.clone()
                };
                debug!(count = response.updates.len(), ts = %next.ts, "step: a_check");
                Ok(Batch::new(next, response.updates))
            }
            // History partially lost; continue from the ts the server suggests.
            Some(1) => {
                warn!(ts = ?response.ts, "long poll history outdated, adopting new ts");
                let next = LongPollSession {
                    ts: response.ts.unwrap_or_else(|| session.ts.clone()),
                    ..session.clone()
                };
                Ok(Batch::empty(next))
            }
            // Key expired; the position is still valid.
            Some(2) => {
                warn!("long poll key expired, requesting a new one");
                let fresh = self.request_session().await?;
                Ok(Batch::empty(LongPollSession {
                    ts: session.ts.clone(),
                    ..fresh
                }))
            }
            // Session lost entirely.
            Some(3) => {
                warn!("long poll session lost, requesting a new one");
                Ok(Batch::empty(self.request_session().await?))
            }
            Some(code) => Err(DbotError::Api {
                code,
                description: "long poll check failed".to_string(),
            }),
        }
    }
}
