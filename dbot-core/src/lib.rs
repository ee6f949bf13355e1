//! # dbot-core
//!
//! Platform-agnostic update engine: [`Matcher`] classifies updates with ordered [`MatchRule`]s,
//! [`Dispatcher`] transforms every match and emits it on the [`EventBus`], and [`Poller`] feeds
//! batches from an [`UpdateSource`] into the dispatcher. Also hosts the shared error types and
//! tracing initialization. Used by dbot-telegram and dbot-vk.

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod logger;
pub mod matcher;
pub mod polling;
pub mod transport;

pub use dispatcher::{DispatchReport, Dispatcher, UpdateHandler};
pub use engine::Engine;
pub use error::{DbotError, HandlerError, Result};
pub use event_bus::{EmitOutcome, EventBus, EventKind, Listener, ListenerPolicy};
pub use logger::init_tracing;
pub use matcher::{MatchRule, Matcher};
pub use polling::{run_polling_loop, Poller, PollingConfig, PollingSession};
pub use transport::{request_as, ApiTransport, Batch, UpdateSource};
