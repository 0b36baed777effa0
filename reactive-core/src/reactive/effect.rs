//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies. An error from this first run is returned to the
//!    caller and the effect is disposed.
//!
//! 2. When any dependency changes, the effect is queued and re-runs when the
//!    runtime drains its queue (immediately, or at the end of a batch).
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution, so a branch no longer taken stops
//!    notifying it.
//!
//! # Re-entrancy
//!
//! If the effect's own run writes to a cell it depends on, the effect does
//! not recurse. The trigger is recorded as a pending re-run, performed once
//! the current run returns. A run that keeps re-triggering itself is cut
//! off after `max_reruns` passes and reported as
//! [`ReactiveError::NonConvergent`].
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager.
//! - The runtime keeps effects alive until they are disposed; computeds
//!   live as long as their handles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, RegistrationGuard, Runtime};
use super::subscriber::{SubscriberId, SubscriberKind};
use crate::config;
use crate::error::{ReactiveError, Result};
use crate::graph::Cell;

type EffectFn = Box<dyn Fn() -> Result<()>>;

struct EffectInner {
    subscriber_id: SubscriberId,

    run: EffectFn,

    running: AtomicBool,

    /// A trigger arrived while running.
    pending: AtomicBool,

    disposed: AtomicBool,

    run_count: AtomicUsize,
}

impl EffectInner {
    /// Run the effect, then any re-run its own writes requested.
    fn execute(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return Ok(());
        }
        let _running = RunningGuard(&self.running);
        let max_reruns = config::config().max_reruns;
        let mut passes = 0;

        loop {
            self.pending.store(false, Ordering::SeqCst);
            passes += 1;

            Runtime::untrack_all(self.subscriber_id);
            let result = {
                let _ctx = ReactiveContext::enter(self.subscriber_id);
                (self.run)()
            };
            self.run_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(effect = %self.subscriber_id, pass = passes, "effect ran");
            result?;

            if self.disposed.load(Ordering::SeqCst) {
                // Reads made after dispose() in this run re-added edges.
                Runtime::untrack_all(self.subscriber_id);
                return Ok(());
            }
            if !self.pending.load(Ordering::SeqCst) {
                return Ok(());
            }
            if passes >= max_reruns {
                self.pending.store(false, Ordering::SeqCst);
                return Err(ReactiveError::NonConvergent {
                    subscriber: self.subscriber_id,
                    runs: passes,
                });
            }
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn kind(&self) -> SubscriberKind {
        SubscriberKind::Effect
    }

    fn schedule(&self) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            return false;
        }
        if self.running.load(Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn run(&self) -> Result<()> {
        self.execute()
    }
}

/// Clears the running flag even if the effect panics.
pub(crate) struct RunningGuard<'a>(pub(crate) &'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Handles are cheap clones of one shared effect. Dropping a handle does
/// not stop the effect; call [`Effect::dispose`].
///
/// # Example
///
/// ```rust,ignore
/// let state = Container::from_json(json!({"count": 0}))?;
///
/// let effect = Effect::new({
///     let state = state.clone();
///     move || {
///         println!("Count is: {}", state.get("count")?);
///         Ok(())
///     }
/// })?;
///
/// state.set("count", 5)?;  // Prints: "Count is: 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it once.
    ///
    /// An error from the first run is returned and the effect is disposed.
    pub fn new<F>(run: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        Runtime::register_owned(inner.clone());
        let _registration = RegistrationGuard(inner.subscriber_id);

        let effect = Self { inner };
        if let Err(err) = effect.inner.execute() {
            effect.dispose();
            return Err(err);
        }
        Ok(effect)
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Stop the effect.
    ///
    /// Removes all its edges and releases the runtime's reference. A run in
    /// progress finishes, but nothing runs afterwards. Safe to call more
    /// than once.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        Runtime::unregister(self.inner.subscriber_id);
        tracing::debug!(effect = %self.inner.subscriber_id, "effect disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Get the number of cells read during the latest run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.subscriber_id)
    }

    /// The cells read during the latest run.
    pub fn dependencies(&self) -> Vec<Cell> {
        Runtime::dependencies_of(self.inner.subscriber_id)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
