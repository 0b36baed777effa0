//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive cells: an
//! effect, a derived value, or a watcher.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID keys its edges in
/// the dependency graph and its entry in the runtime registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a subscriber does when one of its cells changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberKind {
    /// Re-runs its function (eager).
    Effect,
    /// Marks its cache dirty and forwards the notification (lazy).
    Derived,
    /// Re-reads its declared paths and fires a callback per changed path.
    Watcher,
}

impl SubscriberKind {
    /// Whether notification queues this subscriber for a run.
    pub fn is_eager(self) -> bool {
        !matches!(self, SubscriberKind::Derived)
    }
}
