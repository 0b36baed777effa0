//! Batching
//!
//! Inside a batch, writes still land immediately and derived values are
//! still invalidated, but effects and watchers are only queued. When the
//! outermost batch closes the queue drains once, so a subscriber touched by
//! many writes runs a single time and sees the final state.
//!
//! Batches nest; only the outermost one drains.

use super::runtime::Runtime;

/// Guard for an open batch. Closing it (dropping the guard) drains the
/// queue if it was the outermost batch.
///
/// If the batch is unwinding from a panic, the queue is discarded instead:
/// the writes made before the panic stay, but no subscriber is run on
/// their behalf.
#[must_use = "the batch closes as soon as the guard is dropped"]
pub struct BatchScope {
    depth: usize,
}

impl BatchScope {
    /// Open a batch.
    pub fn enter() -> Self {
        let depth = Runtime::enter_batch();
        tracing::trace!(depth, "batch opened");
        Self { depth }
    }

    /// Nesting depth of this batch, starting at 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        if !Runtime::exit_batch() {
            return;
        }
        if std::thread::panicking() {
            let dropped = Runtime::discard_pending();
            tracing::warn!(dropped, "batch unwound; pending subscribers discarded");
            return;
        }
        Runtime::flush();
    }
}

/// Run `f` as one batch and return its result.
///
/// ```rust,ignore
/// batch(|| {
///     state.set("x", 1)?;
///     state.set("x", 2)?;
///     state.set("x", 3)
/// })?;
/// // Effects reading `x` ran once and saw 3.
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _scope = BatchScope::enter();
    f()
}
