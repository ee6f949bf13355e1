//! Listener registry keyed by event kind.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::{DbotError, Result};

/// Closed set of event kinds a platform can emit. `label` is the stable wire-facing name.
pub trait EventKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    fn label(&self) -> &'static str;
}

/// A registered callback. Errors are handled according to the bus's [`ListenerPolicy`].
pub type Listener<A> = Arc<dyn Fn(&A) -> anyhow::Result<()> + Send + Sync>;

/// What a failing listener does to the rest of an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerPolicy {
    /// The first error stops the emission and is returned to the caller.
    Propagate,
    /// Each error is logged and counted; remaining listeners still run.
    #[default]
    Isolate,
}

/// Result of one [`EventBus::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitOutcome {
    pub invoked: usize,
    pub failed: usize,
}

pub struct EventBus<K, A> {
    listeners: RwLock<HashMap<K, Vec<Listener<A>>>>,
    policy: ListenerPolicy,
}

impl<K: EventKind, A> Default for EventBus<K, A> {
    fn default() -> Self {
        Self::new(ListenerPolicy::default())
    }
}

impl<K: EventKind, A> EventBus<K, A> {
    pub fn new(policy: ListenerPolicy) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> ListenerPolicy {
        self.policy
    }

    /// Appends `listener` to the bucket for `kind`. The same callback may be added more than once.
    pub fn on<F>(&self, kind: K, listener: F)
    where
        F: Fn(&A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.entry(kind).or_default().push(Arc::new(listener));
        debug!(kind = kind.label(), "listener registered");
    }

    pub fn listener_count(&self, kind: K) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Calls every listener currently registered for `kind`, once each, in registration order.
    ///
    /// The bucket is snapshotted first, so listeners may register further listeners; those
    /// only see later emissions.
    pub fn emit(&self, kind: K, argument: &A) -> Result<EmitOutcome> {
        let bucket: Vec<Listener<A>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut outcome = EmitOutcome::default();
        for (index, listener) in bucket.iter().enumerate() {
            outcome.invoked += 1;
            if let Err(e) = listener(argument) {
                outcome.failed += 1;
                match self.policy {
                    ListenerPolicy::Propagate => {
                        return Err(DbotError::Listener {
                            kind: kind.label().to_string(),
                            source: e,
                        });
                    }
                    ListenerPolicy::Isolate => {
                        warn!(
                            kind = kind.label(),
                            listener_index = index,
                            error = %e,
                            "listener failed, continuing"
                        );
                    }
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Ping,
        Pong,
    }

    impl EventKind for Kind {
        fn label(&self) -> &'static str {
            match self {
                Kind::Ping => "ping",
                Kind::Pong => "pong",
            }
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener<String>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for = Arc::clone(&log);
        let make = move |name: &'static str| -> Listener<String> {
            let log = Arc::clone(&log_for);
            Arc::new(move |arg: &String| {
                log.lock().unwrap().push(format!("{}:{}", name, arg));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_emit_invokes_listener_once() {
        let bus: EventBus<Kind, String> = EventBus::default();
        let (log, make) = recorder();
        let l1 = make("l1");
        bus.on(Kind::Ping, move |a| l1(a));

        let outcome = bus.emit(Kind::Ping, &"A".to_string()).unwrap();

        assert_eq!(outcome, EmitOutcome { invoked: 1, failed: 0 });
        assert_eq!(*log.lock().unwrap(), vec!["l1:A"]);
    }

    #[test]
    fn test_second_listener_runs_after_first() {
        let bus: EventBus<Kind, String> = EventBus::default();
        let (log, make) = recorder();
        let l1 = make("l1");
        let l2 = make("l2");
        bus.on(Kind::Ping, move |a| l1(a));
        bus.on(Kind::Ping, move |a| l2(a));

        bus.emit(Kind::Ping, &"A".to_string()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["l1:A", "l2:A"]);
    }

    #[test]
    fn test_duplicate_listener_fires_twice() {
        let bus: EventBus<Kind, String> = EventBus::default();
        let (log, make) = recorder();
        let l = make("dup");
        let l2 = Arc::clone(&l);
        bus.on(Kind::Ping, move |a| l(a));
        bus.on(Kind::Ping, move |a| l2(a));

        bus.emit(Kind::Ping, &"x".to_string()).unwrap();

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(bus.listener_count(Kind::Ping), 2);
    }

    #[test]
    fn test_emit_without_listeners_is_noop() {
        let bus: EventBus<Kind, String> = EventBus::default();
        let outcome = bus.emit(Kind::Pong, &"x".to_string()).unwrap();
        assert_eq!(outcome.invoked, 0);
        assert_eq!(bus.listener_count(Kind::Pong), 0);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let bus: EventBus<Kind, String> = EventBus::default();
        let (log, make) = recorder();
        let ping = make("ping");
        bus.on(Kind::Ping, move |a| ping(a));

        bus.emit(Kind::Pong, &"x".to_string()).unwrap();

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_propagate_policy_aborts_remaining_listeners() {
        let bus: EventBus<Kind, String> = EventBus::new(ListenerPolicy::Propagate);
        let (log, make) = recorder();
        let before = make("before");
        let after = make("after");
        bus.on(Kind::Ping, move |a| before(a));
        bus.on(Kind::Ping, |_| anyhow::bail!("boom"));
        bus.on(Kind::Ping, move |a| after(a));

        let err = bus.emit(Kind::Ping, &"A".to_string()).unwrap_err();

        assert!(matches!(err, DbotError::Listener { ref kind, .. } if kind == "ping"));
        assert_eq!(*log.lock().unwrap(), vec!["before:A"]);
    }

    #[test]
    fn test_isolate_policy_continues_after_failure() {
        let bus: EventBus<Kind, String> = EventBus::new(ListenerPolicy::Isolate);
        let (log, make) = recorder();
        let after = make("after");
        bus.on(Kind::Ping, |_| anyhow::bail!("boom"));
        bus.on(Kind::Ping, move |a| after(a));

        let outcome = bus.emit(Kind::Ping, &"A".to_string()).unwrap();

        assert_eq!(outcome, EmitOutcome { invoked: 2, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec!["after:A"]);
    }

    #[test]
    fn test_listener_registered_during_emit_sees_only_later_emissions() {
        let bus: Arc<EventBus<Kind, String>> = Arc::new(EventBus::default());
        let (log, make) = recorder();
        let late = make("late");
        let bus_inner = Arc::clone(&bus);
        let late = Arc::new(Mutex::new(Some(late)));
        bus.on(Kind::Ping, move |_| {
            if let Some(l) = late.lock().unwrap().take() {
                bus_inner.on(Kind::Ping, move |a| l(a));
            }
            Ok(())
        });

        bus.emit(Kind::Ping, &"first".to_string()).unwrap();
        assert!(log.lock().unwrap().is_empty());

        bus.emit(Kind::Ping, &"second".to_string()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["late:second"]);
    }
}
