//! [`VkBot`]: built-in rules, event bus and Bots Long Poll behind one handle.

use std::sync::Arc;

use dbot_core::{
    ApiTransport, DbotError, DispatchReport, Engine, ListenerPolicy, PollingConfig,
    PollingSession, Result,
};
use serde_json::Value;
use tracing::info;

use crate::args::{VkArgument, VkMessageArgs, VkUserEventArgs};
use crate::client::VkClient;
use crate::config::VkConfig;
use crate::rules::{builtin_rules, VkEvent};
use crate::source::VkSource;
use crate::types::{LongPollSession, UpdateItem, User};
use crate::users::get_user;

type VkEngine = Engine<VkSource, VkEvent, VkArgument>;

pub struct VkBot {
    client: Arc<VkClient>,
    engine: VkEngine,
}

impl VkBot {
    pub fn new(config: VkConfig) -> Result<Self> {
        Self::with_options(config, ListenerPolicy::default(), PollingConfig::default())
    }

    pub fn with_options(
        config: VkConfig,
        policy: ListenerPolicy,
        polling: PollingConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DbotError::Config(e.to_string()))?;
        let client = Arc::new(VkClient::new(&config)?);
        let api: Arc<dyn ApiTransport> = client.clone();
        let source = Arc::new(VkSource::new(
            Arc::clone(&client),
            config.group_id,
            config.wait,
        ));
        let engine = Engine::new(source, builtin_rules(api), policy, polling);
        info!(group_id = config.group_id, api_version = %config.api_version, "vk bot created");
        Ok(Self { client, engine })
    }

    pub fn client(&self) -> &Arc<VkClient> {
        &self.client
    }

    pub fn engine(&self) -> &VkEngine {
        &self.engine
    }

    pub fn on<F>(&self, kind: VkEvent, listener: F)
    where
        F: Fn(&VkArgument) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.engine.on(kind, listener);
    }

    fn on_message_kind<F>(&self, kind: VkEvent, listener: F)
    where
        F: Fn(&VkMessageArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.engine.on(kind, move |argument| match argument {
            VkArgument::Message(args) => listener(args),
            other => Err(anyhow::anyhow!("unexpected argument for {:?}: {:?}", kind, other)),
        });
    }

    fn on_user_event_kind<F>(&self, kind: VkEvent, listener: F)
    where
        F: Fn(&VkUserEventArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.engine.on(kind, move |argument| match argument {
            VkArgument::UserEvent(args) => listener(args),
            other => Err(anyhow::anyhow!("unexpected argument for {:?}: {:?}", kind, other)),
        });
    }

    /// New incoming message (`message_new`).
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&VkMessageArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_message_kind(VkEvent::Message, listener);
    }

    /// Outgoing message sent by the community (`message_reply`).
    pub fn on_message_reply<F>(&self, listener: F)
    where
        F: Fn(&VkMessageArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_message_kind(VkEvent::MessageReply, listener);
    }

    pub fn on_message_edit<F>(&self, listener: F)
    where
        F: Fn(&VkMessageArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_message_kind(VkEvent::MessageEdit, listener);
    }

    pub fn on_message_allow<F>(&self, listener: F)
    where
        F: Fn(&VkUserEventArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_user_event_kind(VkEvent::MessageAllow, listener);
    }

    pub fn on_message_deny<F>(&self, listener: F)
    where
        F: Fn(&VkUserEventArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_user_event_kind(VkEvent::MessageDeny, listener);
    }

    pub fn handle_update(&self, update: &UpdateItem) -> Result<DispatchReport> {
        self.engine.handle_update(update)
    }

    /// Obtains a long-poll session, then starts polling. Fails (and stays idle) if the session
    /// request fails.
    pub async fn start_polling(&self) -> Result<()> {
        self.engine.start_polling().await
    }

    pub fn stop_polling(&self) {
        self.engine.stop_polling();
    }

    pub fn is_polling(&self) -> bool {
        self.engine.is_polling()
    }

    pub async fn join(&self) -> Result<Option<PollingSession<LongPollSession>>> {
        self.engine.join().await
    }

    /// Raw API call; returns the `response` payload.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.client.request(method, params).await
    }

    pub async fn get_user(&self, user_id: i64, fields: &[&str]) -> Result<User> {
        get_user(self.client.as_ref(), user_id, fields).await
    }
}
