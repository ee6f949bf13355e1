//! Turns one update into listener invocations: classify, transform each match, emit.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::event_bus::{EventBus, EventKind};
use crate::matcher::Matcher;

/// Counters for one dispatched update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Rules whose `test` accepted the update.
    pub matched: usize,
    /// Emissions performed (one per successfully transformed match).
    pub emitted: usize,
    /// Matches skipped because `handle` failed.
    pub transform_errors: usize,
    /// Listener failures absorbed by an isolating bus.
    pub listener_errors: usize,
}

/// Anything the polling loop can feed updates into.
pub trait UpdateHandler<U>: Send + Sync {
    fn handle_update(&self, update: &U) -> Result<DispatchReport>;
}

pub struct Dispatcher<K, U, A> {
    matcher: Arc<Matcher<K, U, A>>,
    bus: Arc<EventBus<K, A>>,
}

impl<K, U, A> Clone for Dispatcher<K, U, A> {
    fn clone(&self) -> Self {
        Self {
            matcher: Arc::clone(&self.matcher),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<K: EventKind, U, A> Dispatcher<K, U, A> {
    pub fn new(matcher: Arc<Matcher<K, U, A>>, bus: Arc<EventBus<K, A>>) -> Self {
        Self { matcher, bus }
    }

    pub fn matcher(&self) -> &Arc<Matcher<K, U, A>> {
        &self.matcher
    }

    pub fn bus(&self) -> &Arc<EventBus<K, A>> {
        &self.bus
    }

    /// For every matching rule, in registry order: build the argument with `handle`, then emit it
    /// under the rule's kind.
    ///
    /// A failing `handle` skips only that rule's emission. A successful `handle` is always
    /// emitted, even if the argument is partial. Listener errors propagate only when the bus
    /// uses [`crate::ListenerPolicy::Propagate`].
    pub fn dispatch(&self, update: &U) -> Result<DispatchReport> {
        let matches = self.matcher.get_matches(update);
        let mut report = DispatchReport {
            matched: matches.len(),
            ..DispatchReport::default()
        };

        for rule in matches {
            let kind = rule.kind();
            let argument = match rule.handle(update) {
                Ok(argument) => argument,
                Err(e) => {
                    report.transform_errors += 1;
                    warn!(kind = kind.label(), error = %e, "transform failed, emission skipped");
                    continue;
                }
            };
            let outcome = self.bus.emit(kind, &argument)?;
            report.emitted += 1;
            report.listener_errors += outcome.failed;
            debug!(kind = kind.label(), listeners = outcome.invoked, "emitted");
        }

        Ok(report)
    }
}

impl<K, U, A> UpdateHandler<U> for Dispatcher<K, U, A>
where
    K: EventKind,
    U: Send + Sync,
    A: Send + Sync,
{
    fn handle_update(&self, update: &U) -> Result<DispatchReport> {
        self.dispatch(update)
    }
}
