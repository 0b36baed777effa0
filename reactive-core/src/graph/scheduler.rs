//! Update Scheduler
//!
//! The scheduler owns the queue of subscribers waiting to re-run and the
//! batch nesting counter.
//!
//! # Algorithm
//!
//! 1. A write looks up affected subscribers in the dependency graph.
//! 2. Derived values are invalidated on the spot (they are lazy and never
//!    queued), so by the time anything in the queue runs every derived value
//!    already knows it is stale.
//! 3. Effects and watchers are queued. The queue is a set: a subscriber
//!    queued twice runs once.
//! 4. If no batch is open and no flush is in progress, the runtime drains
//!    the queue. Writes made by subscribers during the drain append to the
//!    same queue and are picked up by the same drain.
//!
//! Each subscriber's runs within one drain are counted so that a pair of
//! subscribers re-triggering each other forever is cut off and reported.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::reactive::SubscriberId;

/// Queue of pending subscribers plus batch bookkeeping.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// Batch nesting depth. Zero means no batch is open.
    depth: usize,

    /// Whether a drain is currently in progress.
    flushing: bool,

    /// Pending subscribers in arrival order, deduplicated.
    queue: IndexSet<SubscriberId>,

    /// Runs per subscriber during the current drain.
    runs: HashMap<SubscriberId, usize>,
}

impl UpdateScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a (possibly nested) batch. Returns the new depth.
    pub fn enter_batch(&mut self) -> usize {
        self.depth += 1;
        self.depth
    }

    /// Close a batch. Returns `true` when the outermost batch closed.
    pub fn exit_batch(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    /// Whether a batch is open.
    pub fn is_batching(&self) -> bool {
        self.depth > 0
    }

    /// Current batch depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether a drain is in progress.
    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    /// Queue a subscriber. Returns `false` if it was already pending.
    pub fn enqueue(&mut self, subscriber: SubscriberId) -> bool {
        self.queue.insert(subscriber)
    }

    /// Drop a subscriber from the queue (used on disposal).
    pub fn cancel(&mut self, subscriber: SubscriberId) -> bool {
        self.queue.shift_remove(&subscriber)
    }

    /// Start a drain if one may start now.
    ///
    /// Returns `false` while a batch is open or another drain is running;
    /// in both cases the pending work is picked up later by whoever holds
    /// the drain.
    pub fn begin_flush(&mut self) -> bool {
        if self.flushing || self.depth > 0 || self.queue.is_empty() {
            return false;
        }
        self.flushing = true;
        self.runs.clear();
        true
    }

    /// Take the next pending subscriber.
    pub fn next(&mut self) -> Option<SubscriberId> {
        self.queue.shift_remove_index(0)
    }

    /// Count a run of `subscriber` in the current drain. Returns the total.
    pub fn record_run(&mut self, subscriber: SubscriberId) -> usize {
        let runs = self.runs.entry(subscriber).or_insert(0);
        *runs += 1;
        *runs
    }

    /// Finish the current drain.
    pub fn end_flush(&mut self) {
        self.flushing = false;
        self.runs.clear();
    }

    /// Throw away every pending subscriber. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Number of pending subscribers.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_deduplicates_in_arrival_order() {
        let mut scheduler = UpdateScheduler::new();
        let a = SubscriberId::new();
        let b = SubscriberId::new();

        assert!(scheduler.enqueue(a));
        assert!(scheduler.enqueue(b));
        assert!(!scheduler.enqueue(a));
        assert_eq!(scheduler.pending(), 2);

        assert!(scheduler.begin_flush());
        assert_eq!(scheduler.next(), Some(a));
        assert_eq!(scheduler.next(), Some(b));
        assert_eq!(scheduler.next(), None);
        scheduler.end_flush();
    }

    #[test]
    fn nested_batches_close_once() {
        let mut scheduler = UpdateScheduler::new();
        assert_eq!(scheduler.enter_batch(), 1);
        assert_eq!(scheduler.enter_batch(), 2);

        scheduler.enqueue(SubscriberId::new());
        assert!(!scheduler.begin_flush());

        assert!(!scheduler.exit_batch());
        assert!(scheduler.exit_batch());
        assert!(scheduler.begin_flush());
    }

    #[test]
    fn flush_is_not_reentrant() {
        let mut scheduler = UpdateScheduler::new();
        scheduler.enqueue(SubscriberId::new());
        assert!(scheduler.begin_flush());

        scheduler.enqueue(SubscriberId::new());
        assert!(!scheduler.begin_flush());
        assert!(scheduler.is_flushing());
    }

    #[test]
    fn runs_are_counted_per_drain() {
        let mut scheduler = UpdateScheduler::new();
        let a = SubscriberId::new();

        scheduler.enqueue(a);
        assert!(scheduler.begin_flush());
        assert_eq!(scheduler.record_run(a), 1);
        assert_eq!(scheduler.record_run(a), 2);
        scheduler.end_flush();

        scheduler.enqueue(a);
        assert!(scheduler.begin_flush());
        assert_eq!(scheduler.record_run(a), 1);
    }

    #[test]
    fn discard_and_cancel_empty_the_queue() {
        let mut scheduler = UpdateScheduler::new();
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        scheduler.enqueue(a);
        scheduler.enqueue(b);

        assert!(scheduler.cancel(a));
        assert!(!scheduler.cancel(a));
        assert_eq!(scheduler.discard(), 1);
        assert_eq!(scheduler.pending(), 0);
    }
}
