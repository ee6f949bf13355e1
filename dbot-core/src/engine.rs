//! Wiring of matcher, event bus, dispatcher and poller for one bot instance.

use std::sync::Arc;

use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::Result;
use crate::event_bus::{EventBus, EventKind, ListenerPolicy};
use crate::matcher::{MatchRule, Matcher};
use crate::polling::{Poller, PollingConfig, PollingSession};
use crate::transport::UpdateSource;

/// One bot's ingestion pipeline: `source` → poller → dispatcher → matcher → bus → listeners.
pub struct Engine<S, K, A>
where
    S: UpdateSource,
{
    dispatcher: Arc<Dispatcher<K, S::Update, A>>,
    poller: Poller<S, Dispatcher<K, S::Update, A>>,
}

impl<S, K, A> Engine<S, K, A>
where
    S: UpdateSource,
    K: EventKind,
    A: Send + Sync + 'static,
{
    pub fn new(
        source: Arc<S>,
        rules: Vec<Arc<MatchRule<K, S::Update, A>>>,
        policy: ListenerPolicy,
        polling: PollingConfig,
    ) -> Self {
        let matcher = Arc::new(Matcher::with_rules(rules));
        let bus = Arc::new(EventBus::new(policy));
        let dispatcher = Arc::new(Dispatcher::new(matcher, bus));
        let poller = Poller::new(source, Arc::clone(&dispatcher), polling);
        Self { dispatcher, poller }
    }

    pub fn matcher(&self) -> &Arc<Matcher<K, S::Update, A>> {
        self.dispatcher.matcher()
    }

    pub fn bus(&self) -> &Arc<EventBus<K, A>> {
        self.dispatcher.bus()
    }

    pub fn on<F>(&self, kind: K, listener: F)
    where
        F: Fn(&A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus().on(kind, listener);
    }

    /// Dispatches one update synchronously, outside the polling loop.
    pub fn handle_update(&self, update: &S::Update) -> Result<DispatchReport> {
        self.dispatcher.dispatch(update)
    }

    pub async fn start_polling(&self) -> Result<()> {
        self.poller.start_polling().await
    }

    pub fn stop_polling(&self) {
        self.poller.stop_polling();
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Waits for the polling task; see [`Poller::join`].
    pub async fn join(&self) -> Result<Option<PollingSession<S::Cursor>>> {
        self.poller.join().await
    }
}
