//! [`TelegramBot`]: built-in rules, event bus and `getUpdates` polling behind one handle.

use std::sync::Arc;

use dbot_core::{
    ApiTransport, DbotError, DispatchReport, Engine, ListenerPolicy, PollingConfig,
    PollingSession, Result,
};
use serde_json::Value;
use tracing::info;

use crate::args::{CommandMatch, FileMessage, MediaMatch, MessageArgs, TelegramArgument};
use crate::client::TelegramClient;
use crate::config::TelegramConfig;
use crate::rules::{builtin_rules, RuleContext, TelegramEvent};
use crate::source::TelegramSource;
use crate::types::{CallbackQuery, ChosenInlineResult, InlineQuery, Message, Update};

type TelegramEngine = Engine<TelegramSource, TelegramEvent, TelegramArgument>;

pub struct TelegramBot {
    client: Arc<TelegramClient>,
    engine: TelegramEngine,
}

impl TelegramBot {
    /// Bot with isolated listener errors and the default failure policy.
    pub fn new(config: TelegramConfig) -> Result<Self> {
        Self::with_options(config, ListenerPolicy::default(), PollingConfig::default())
    }

    pub fn with_options(
        config: TelegramConfig,
        policy: ListenerPolicy,
        polling: PollingConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DbotError::Config(e.to_string()))?;
        let client = Arc::new(TelegramClient::new(&config)?);
        let api: Arc<dyn ApiTransport> = client.clone();
        let ctx = Arc::new(RuleContext::new(api, client.file_base()));
        let source = Arc::new(TelegramSource::new(Arc::clone(&client), config.poll_timeout));
        let engine = Engine::new(source, builtin_rules(ctx), policy, polling);
        info!(api_url = %config.api_url, "telegram bot created");
        Ok(Self { client, engine })
    }

    pub fn client(&self) -> &Arc<TelegramClient> {
        &self.client
    }

    pub fn engine(&self) -> &TelegramEngine {
        &self.engine
    }

    /// Registers a listener for any event kind; see [`TelegramArgument`] for the variant each kind
    /// receives.
    pub fn on<F>(&self, kind: TelegramEvent, listener: F)
    where
        F: Fn(&TelegramArgument) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.engine.on(kind, listener);
    }

    fn on_typed<T, X, F>(&self, kind: TelegramEvent, extract: X, listener: F)
    where
        T: ?Sized,
        X: Fn(&TelegramArgument) -> Option<&T> + Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.engine.on(kind, move |argument| match extract(argument) {
            Some(value) => listener(value),
            None => Err(anyhow::anyhow!(
                "unexpected argument for {:?}: {:?}",
                kind,
                argument
            )),
        });
    }

    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&MessageArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(TelegramEvent::Message, TelegramArgument::message_args, listener);
    }

    pub fn on_message_edited<F>(&self, listener: F)
    where
        F: Fn(&MessageArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(
            TelegramEvent::MessageEdited,
            TelegramArgument::message_args,
            listener,
        );
    }

    pub fn on_channel_post<F>(&self, listener: F)
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(TelegramEvent::ChannelPost, TelegramArgument::as_post, listener);
    }

    pub fn on_command<F>(&self, listener: F)
    where
        F: Fn(&CommandMatch) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(TelegramEvent::Command, TelegramArgument::as_command, listener);
    }

    pub fn on_media<F>(&self, listener: F)
    where
        F: Fn(&MediaMatch) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(TelegramEvent::Media, TelegramArgument::as_media, listener);
    }

    /// Listener for a file-bearing kind (photo, video, audio, voice, animation, sticker).
    pub fn on_file<F>(&self, kind: TelegramEvent, listener: F) -> Result<()>
    where
        F: Fn(&FileMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        match kind {
            TelegramEvent::Photo
            | TelegramEvent::Video
            | TelegramEvent::Audio
            | TelegramEvent::Voice
            | TelegramEvent::Animation
            | TelegramEvent::Sticker => {
                self.on_typed(kind, TelegramArgument::as_file, listener);
                Ok(())
            }
            other => Err(DbotError::Config(format!(
                "{:?} does not carry a file",
                other
            ))),
        }
    }

    pub fn on_callback_query<F>(&self, listener: F)
    where
        F: Fn(&CallbackQuery) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(
            TelegramEvent::CallbackQuery,
            TelegramArgument::as_callback_query,
            listener,
        );
    }

    pub fn on_inline_query<F>(&self, listener: F)
    where
        F: Fn(&InlineQuery) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(
            TelegramEvent::InlineQuery,
            TelegramArgument::as_inline_query,
            listener,
        );
    }

    pub fn on_chosen_inline_result<F>(&self, listener: F)
    where
        F: Fn(&ChosenInlineResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed(
            TelegramEvent::ChosenInlineResult,
            TelegramArgument::as_chosen_inline_result,
            listener,
        );
    }

    /// Dispatches one update without polling (e.g. from a webhook handler of the host).
    pub fn handle_update(&self, update: &Update) -> Result<DispatchReport> {
        self.engine.handle_update(update)
    }

    pub async fn start_polling(&self) -> Result<()> {
        self.engine.start_polling().await
    }

    pub fn stop_polling(&self) {
        self.engine.stop_polling();
    }

    pub fn is_polling(&self) -> bool {
        self.engine.is_polling()
    }

    /// Waits for the polling task. `Err(PollingExhausted)` when it gave up on the stream.
    pub async fn join(&self) -> Result<Option<PollingSession<Option<i64>>>> {
        self.engine.join().await
    }

    /// Raw Bot API call; returns the envelope's `result`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.client.request(method, params).await
    }
}
