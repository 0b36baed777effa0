//! Derived Value Implementation
//!
//! A computed is a cached derived value that re-evaluates only when one of
//! its dependencies changes.
//!
//! # How Computeds Work
//!
//! 1. On first read, the computed runs its function inside its own tracking
//!    scope and caches the result.
//!
//! 2. While clean, reads return the cache.
//!
//! 3. When a dependency changes, the runtime marks the computed dirty and
//!    forwards the notification to whoever read the computed. Nothing is
//!    recomputed yet.
//!
//! 4. The next read recomputes and re-caches.
//!
//! # Why This Matters
//!
//! A computed that nobody reads after an invalidation never runs again, and
//! one read many times between invalidations runs once.
//!
//! # Cycles
//!
//! A computed that re-enters its own computation, directly or through other
//! computeds, fails with [`ReactiveError::DerivedCycle`] at the point of
//! re-entry. No stale or partial value is returned.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use super::subscriber::{SubscriberId, SubscriberKind};
use crate::error::{ReactiveError, Result};
use crate::graph::{Cell, Key, SourceId};

/// Dirty state for a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or the value was never computed).
    Dirty,
}

type ComputeFn<T> = Box<dyn Fn() -> Result<T>>;

struct ComputedInner<T> {
    name: Arc<str>,

    /// Identity of the computed's own cell.
    source: SourceId,

    subscriber_id: SubscriberId,

    compute: ComputeFn<T>,

    /// The cached value (None if never computed successfully).
    value: Mutex<Option<T>>,

    state: Mutex<DerivedState>,

    /// Set while the function runs; re-entry means a cycle.
    computing: AtomicBool,

    computations: AtomicUsize,
}

impl<T> ComputedInner<T>
where
    T: Clone + 'static,
{
    fn cell(&self) -> Cell {
        Cell::new(self.source, Key::Value)
    }

    fn cycle(&self) -> ReactiveError {
        tracing::error!(name = %self.name, "derived value depends on itself");
        ReactiveError::DerivedCycle {
            name: self.name.to_string(),
        }
    }

    fn read(&self) -> Result<T> {
        if self.computing.load(Ordering::SeqCst) {
            return Err(self.cycle());
        }
        if *self.state.lock() == DerivedState::Clean {
            if let Some(value) = self.value.lock().clone() {
                return Ok(value);
            }
        }
        self.recompute()
    }

    fn recompute(&self) -> Result<T> {
        if self.computing.swap(true, Ordering::SeqCst) {
            return Err(self.cycle());
        }
        let _computing = ComputingGuard(&self.computing);

        // Marked clean before running so an invalidation that lands during
        // the run is not lost.
        *self.state.lock() = DerivedState::Clean;
        Runtime::untrack_all(self.subscriber_id);

        let result = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.compute)()
        };
        self.computations.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(value) => {
                *self.value.lock() = Some(value.clone());
                tracing::trace!(name = %self.name, "derived value recomputed");
                Ok(value)
            }
            Err(err) => {
                *self.state.lock() = DerivedState::Dirty;
                Err(err)
            }
        }
    }
}

impl<T> Reactive for ComputedInner<T>
where
    T: Clone + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn kind(&self) -> SubscriberKind {
        SubscriberKind::Derived
    }

    fn invalidate(&self) -> Option<Cell> {
        let mut state = self.state.lock();
        if *state == DerivedState::Clean {
            tracing::trace!(name = %self.name, "derived value invalidated");
        }
        *state = DerivedState::Dirty;
        Some(self.cell())
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
        Runtime::forget_source(self.source);
    }
}

/// Clears the computing flag even if the function panics.
struct ComputingGuard<'a>(&'a AtomicBool);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + PartialEq.
///
/// # Example
///
/// ```rust,ignore
/// let state = Container::from_json(json!({"count": 2}))?;
/// let doubled = Computed::new({
///     let state = state.clone();
///     move || Ok(state.get("count")?.as_i64().unwrap_or(0) * 2)
/// });
/// assert_eq!(doubled.get()?, 4);
/// ```
pub struct Computed<T>
where
    T: Clone + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + 'static,
{
    /// Create a new computed. The function does not run until first read.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T> + 'static,
    {
        Self::named("computed", compute)
    }

    /// Create a computed with a name used in errors and logs.
    pub fn named<F>(name: &str, compute: F) -> Self
    where
        F: Fn() -> Result<T> + 'static,
    {
        let inner = Arc::new(ComputedInner {
            name: Arc::from(name),
            source: SourceId::new(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: Mutex::new(None),
            state: Mutex::new(DerivedState::Dirty),
            computing: AtomicBool::new(false),
            computations: AtomicUsize::new(0),
        });
        let reactive: Arc<dyn Reactive> = inner.clone();
        Runtime::register(&reactive);
        Self { inner }
    }

    /// Read the value, recomputing if dirty.
    ///
    /// Inside a tracking scope the reader is registered on this computed's
    /// own cell, exactly as if it had read a plain property.
    pub fn get(&self) -> Result<T> {
        Runtime::track(self.inner.cell());
        self.inner.read()
    }

    /// Read the value without registering the reader.
    pub fn get_untracked(&self) -> Result<T> {
        self.inner.read()
    }

    /// Mark the computed dirty and notify its readers.
    pub fn invalidate(&self) {
        if let Some(cell) = Reactive::invalidate(&*self.inner) {
            Runtime::notify_cell(cell);
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current dirty state.
    pub fn state(&self) -> DerivedState {
        *self.inner.state.lock()
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == DerivedState::Dirty
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    /// How many times the function has run.
    pub fn computations(&self) -> usize {
        self.inner.computations.load(Ordering::Relaxed)
    }

    /// Number of subscribers reading this computed.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(&self.inner.cell())
    }

    /// Number of cells this computed read during its latest run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.subscriber_id)
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("computations", &self.computations())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
