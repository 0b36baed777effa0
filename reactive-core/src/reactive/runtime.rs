//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects containers, derived
//! values, effects and watchers. It owns the dependency graph, the registry
//! of live subscribers and the update scheduler.
//!
//! # How It Works
//!
//! 1. When a subscriber is created, it registers with the runtime.
//!
//! 2. When a subscriber reads a cell inside its [`ReactiveContext`], the
//!    runtime records the edge immediately, so a run that fails partway
//!    still leaves the edges of the reads it completed.
//!
//! 3. When a cell is written, the runtime:
//!    a. Finds all dependents in the graph
//!    b. Invalidates derived values and forwards the notification to
//!       whoever reads them
//!    c. Queues effects and watchers
//!    d. Drains the queue unless a batch is open or a drain is running
//!
//! # Thread Model
//!
//! All state lives in a thread-local. Every thread has its own independent
//! engine, and handles are neither `Send` nor `Sync`, so every write reaches
//! the graph that tracks its readers.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use super::context::ReactiveContext;
use super::subscriber::{SubscriberId, SubscriberKind};
use crate::config;
use crate::error::{ReactiveError, Result};
use crate::graph::{Cell, DependencyGraph, SourceId, UpdateScheduler};

/// A trait for types that can be notified when dependencies change.
pub trait Reactive {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// What kind of subscriber this is.
    fn kind(&self) -> SubscriberKind;

    /// Mark a lazy subscriber stale.
    ///
    /// Derived values return the cell their own readers track, so the
    /// runtime can forward the notification.
    fn invalidate(&self) -> Option<Cell> {
        None
    }

    /// Request a run of an eager subscriber.
    ///
    /// Returns `false` if the request was absorbed: the subscriber is
    /// disposed, or is running right now and has recorded a pending re-run
    /// it will perform itself.
    fn schedule(&self) -> bool {
        false
    }

    /// Run the subscriber now.
    fn run(&self) -> Result<()> {
        Ok(())
    }
}

struct RuntimeState {
    graph: DependencyGraph,

    /// Live subscribers. Weak so that the graph never keeps caller data
    /// alive on its own.
    registry: HashMap<SubscriberId, Weak<dyn Reactive>>,

    /// Effects and watchers stay alive until disposed.
    owned: HashMap<SubscriberId, Arc<dyn Reactive>>,

    scheduler: UpdateScheduler,

    /// Errors from scheduled runs, waiting to be collected. Bounded by
    /// `max_errors`.
    errors: VecDeque<ReactiveError>,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            registry: HashMap::new(),
            owned: HashMap::new(),
            scheduler: UpdateScheduler::new(),
            errors: VecDeque::new(),
        }
    }

    fn lookup(&self, id: SubscriberId) -> Option<Arc<dyn Reactive>> {
        self.registry.get(&id).and_then(Weak::upgrade)
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Borrow the runtime state. Never call back into caller code while
    /// holding the borrow.
    fn with<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
        RUNTIME.with(|state| f(&mut state.borrow_mut()))
    }

    /// Like [`Runtime::with`], but a no-op during thread teardown.
    fn try_with<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
        RUNTIME
            .try_with(|state| state.try_borrow_mut().ok().map(|mut state| f(&mut state)))
            .ok()
            .flatten()
    }

    /// Register a subscriber that is kept alive by its own handles.
    pub fn register(reactive: &Arc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        Self::with(|rt| rt.registry.insert(id, Arc::downgrade(reactive)));
        tracing::trace!(subscriber = %id, kind = ?reactive.kind(), "registered");
    }

    /// Register a subscriber that the runtime keeps alive until it is
    /// unregistered.
    pub fn register_owned(reactive: Arc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        Self::with(|rt| {
            rt.registry.insert(id, Arc::downgrade(&reactive));
            rt.owned.insert(id, reactive);
        });
        tracing::trace!(subscriber = %id, "registered (owned)");
    }

    /// Remove a subscriber and all of its edges.
    pub fn unregister(id: SubscriberId) {
        let released = Self::try_with(|rt| {
            rt.registry.remove(&id);
            rt.graph.untrack_all(id);
            rt.scheduler.cancel(id);
            rt.owned.remove(&id)
        });
        // Dropped outside the borrow: the closure may own containers whose
        // drop calls back into the runtime.
        drop(released);
    }

    /// Record that the current subscriber read `cell`.
    ///
    /// Does nothing outside a tracking scope.
    pub fn track(cell: Cell) {
        let Some(subscriber) = ReactiveContext::current_subscriber() else {
            return;
        };
        Self::with(|rt| {
            if rt.graph.track(cell.clone(), subscriber) {
                tracing::trace!(%subscriber, source = cell.source.raw(), key = %cell.key, "tracked");
            }
        });
    }

    /// Drop every edge of `subscriber` ahead of a re-run.
    pub fn untrack_all(subscriber: SubscriberId) -> usize {
        Self::try_with(|rt| rt.graph.untrack_all(subscriber)).unwrap_or(0)
    }

    /// Drop every cell owned by `source`.
    pub fn forget_source(source: SourceId) {
        if let Some(removed) = Self::try_with(|rt| rt.graph.forget_source(source)) {
            if removed > 0 {
                tracing::trace!(source = source.raw(), removed, "forgot source");
            }
        }
    }

    /// Cells `subscriber` read during its latest run.
    pub fn dependencies_of(subscriber: SubscriberId) -> Vec<Cell> {
        Self::with(|rt| rt.graph.cells_of(subscriber))
    }

    /// Number of cells `subscriber` currently depends on.
    pub fn dependency_count(subscriber: SubscriberId) -> usize {
        Self::with(|rt| rt.graph.dependency_count(subscriber))
    }

    /// Number of subscribers currently depending on `cell`.
    pub fn subscriber_count(cell: &Cell) -> usize {
        Self::with(|rt| rt.graph.subscriber_count(cell))
    }

    /// Notify every subscriber of a single cell.
    pub fn notify_cell(cell: Cell) {
        Self::notify(vec![cell]);
    }

    /// Notify every subscriber of `cells`, then drain the queue if allowed.
    ///
    /// This is the core update propagation mechanism.
    pub fn notify(cells: Vec<Cell>) {
        let mut frontier = cells;
        let mut invalidated = HashSet::new();

        while !frontier.is_empty() {
            let affected: Vec<Arc<dyn Reactive>> = Self::with(|rt| {
                rt.graph
                    .notify(&frontier)
                    .into_iter()
                    .filter_map(|id| rt.lookup(id))
                    .collect()
            });
            frontier = Vec::new();

            for reactive in affected {
                let id = reactive.subscriber_id();
                if reactive.kind().is_eager() {
                    if reactive.schedule() {
                        Self::with(|rt| rt.scheduler.enqueue(id));
                    }
                } else if invalidated.insert(id) {
                    if let Some(cell) = reactive.invalidate() {
                        frontier.push(cell);
                    }
                }
            }
        }

        Self::flush();
    }

    /// Drain the queue of pending subscribers.
    ///
    /// A no-op while a batch is open or another drain is running; that
    /// drain picks up anything queued in the meantime.
    pub fn flush() {
        if !Self::with(|rt| rt.scheduler.begin_flush()) {
            return;
        }

        let guard = FlushGuard;
        let max_reruns = config::config().max_reruns;
        tracing::debug!(pending = Self::pending(), "flush started");

        loop {
            let next = Self::with(|rt| {
                let id = rt.scheduler.next()?;
                let runs = rt.scheduler.record_run(id);
                Some((id, runs, rt.lookup(id)))
            });
            let Some((id, runs, reactive)) = next else {
                break;
            };
            let Some(reactive) = reactive else {
                continue;
            };

            if runs > max_reruns {
                Self::report(ReactiveError::NonConvergent {
                    subscriber: id,
                    runs: runs - 1,
                });
                continue;
            }

            if let Err(err) = reactive.run() {
                Self::report(err);
            }
        }

        drop(guard);
        tracing::debug!("flush finished");
    }

    /// Record an error from a scheduled run.
    pub fn report(err: ReactiveError) {
        tracing::error!(error = %err, "subscriber failed during scheduled run");
        let max_errors = config::config().max_errors;
        let dropped = Self::with(|rt| {
            rt.errors.push_back(err);
            let excess = rt.errors.len().saturating_sub(max_errors);
            rt.errors.drain(..excess).count()
        });
        if dropped > 0 {
            tracing::warn!(dropped, max_errors, "error queue full; oldest errors dropped");
        }
    }

    /// Take every error reported since the last call.
    pub fn take_errors() -> Vec<ReactiveError> {
        Self::with(|rt| rt.errors.drain(..).collect())
    }

    /// Number of subscribers waiting to run.
    pub fn pending() -> usize {
        Self::with(|rt| rt.scheduler.pending())
    }

    /// Open a batch. Returns the new nesting depth.
    pub(crate) fn enter_batch() -> usize {
        Self::with(|rt| rt.scheduler.enter_batch())
    }

    /// Close a batch. Returns `true` when the outermost batch closed.
    pub(crate) fn exit_batch() -> bool {
        Self::try_with(|rt| rt.scheduler.exit_batch()).unwrap_or(false)
    }

    /// Throw away queued work. Returns how many subscribers were dropped.
    pub(crate) fn discard_pending() -> usize {
        Self::try_with(|rt| rt.scheduler.discard()).unwrap_or(0)
    }

    /// Whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        Self::with(|rt| rt.scheduler.is_batching())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking scope.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Unregisters a subscriber whose first run unwinds, since the caller never
/// receives a handle to dispose it with.
pub(crate) struct RegistrationGuard(pub(crate) SubscriberId);

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::warn!(subscriber = %self.0, "first run panicked; subscriber unregistered");
            Runtime::unregister(self.0);
        }
    }
}

/// Ends the drain even if a subscriber panics, discarding what was left so
/// the scheduler does not stay wedged in the flushing state.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let panicking = std::thread::panicking();
        Runtime::try_with(|rt| {
            if panicking {
                rt.scheduler.discard();
            }
            rt.scheduler.end_flush();
        });
    }
}
