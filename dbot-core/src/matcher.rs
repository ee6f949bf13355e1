//! Rule registry and matcher engine.
//!
//! A [`MatchRule`] pairs an event kind with a `test` predicate and a `handle` transform. The
//! [`Matcher`] keeps rules in insertion order and identifies them by `Arc` pointer, never by value.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::HandlerError;

type TestFn<U> = dyn Fn(&U) -> bool + Send + Sync;
type HandleFn<U, A> = dyn Fn(&U) -> Result<A, HandlerError> + Send + Sync;

/// A classification rule: `kind` is the event it emits, `test` decides whether it applies,
/// `handle` projects the update into the listener argument.
pub struct MatchRule<K, U, A> {
    kind: K,
    test: Box<TestFn<U>>,
    handle: Box<HandleFn<U, A>>,
}

impl<K: Copy, U, A> MatchRule<K, U, A> {
    /// Builds a shared rule; the returned `Arc` is the rule's identity in a [`Matcher`].
    pub fn new<T, H>(kind: K, test: T, handle: H) -> Arc<Self>
    where
        T: Fn(&U) -> bool + Send + Sync + 'static,
        H: Fn(&U) -> Result<A, HandlerError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            kind,
            test: Box::new(test),
            handle: Box::new(handle),
        })
    }

    pub fn kind(&self) -> K {
        self.kind
    }

    /// Must be pure; a panic here aborts the classification pass for the update.
    pub fn test(&self, update: &U) -> bool {
        (self.test)(update)
    }

    /// Only meaningful for an update this rule's `test` accepted.
    pub fn handle(&self, update: &U) -> Result<A, HandlerError> {
        (self.handle)(update)
    }
}

impl<K: fmt::Debug, U, A> fmt::Debug for MatchRule<K, U, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchRule").field("kind", &self.kind).finish()
    }
}

/// Ordered rule registry. Internally synchronized so rules may be added while polling runs.
pub struct Matcher<K, U, A> {
    rules: RwLock<Vec<Arc<MatchRule<K, U, A>>>>,
}

impl<K: Copy, U, A> Default for Matcher<K, U, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy, U, A> Matcher<K, U, A> {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Registry pre-filled with `rules`, keeping their order and skipping repeated `Arc`s.
    pub fn with_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = Arc<MatchRule<K, U, A>>>,
    {
        let matcher = Self::new();
        for rule in rules {
            matcher.add(&rule);
        }
        matcher
    }

    /// Appends `rule` unless this exact rule is already registered. Returns whether it was added.
    pub fn add(&self, rule: &Arc<MatchRule<K, U, A>>) -> bool {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if rules.iter().any(|r| Arc::ptr_eq(r, rule)) {
            return false;
        }
        rules.push(Arc::clone(rule));
        true
    }

    /// Removes `rule` by identity. Returns whether anything was removed.
    pub fn remove(&self, rule: &Arc<MatchRule<K, U, A>>) -> bool {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        match rules.iter().position(|r| Arc::ptr_eq(r, rule)) {
            Some(index) => {
                rules.remove(index);
                true
            }
            None => false,
        }
    }

    /// Rules whose `test` accepts `update`, in registry order.
    pub fn get_matches(&self, update: &U) -> Vec<Arc<MatchRule<K, U, A>>> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules
            .iter()
            .filter(|rule| rule.test(update))
            .cloned()
            .collect()
    }

    pub fn rules(&self) -> Vec<Arc<MatchRule<K, U, A>>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
