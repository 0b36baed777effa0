//! Runtime configuration.
//!
//! Each thread owns an independent reactive runtime, so configuration is
//! per thread as well. Hosts that load settings from a file can deserialize
//! a [`RuntimeConfig`] with serde and hand it to [`configure`].

use std::cell::RefCell;

use serde::Deserialize;

/// Default bound on consecutive re-runs of one subscriber.
pub const DEFAULT_MAX_RERUNS: usize = 100;

/// Default number of undrained errors kept per thread.
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// Tunables for the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times one subscriber may run within a single flush (or a
    /// single coalesced self-re-run loop) before it is reported as
    /// non-convergent.
    pub max_reruns: usize,

    /// How many errors from scheduled runs are kept until
    /// [`Runtime::take_errors`](crate::reactive::Runtime::take_errors)
    /// drains them. The oldest are dropped first.
    pub max_errors: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_reruns: DEFAULT_MAX_RERUNS,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Replace the current thread's runtime configuration.
pub fn configure(config: RuntimeConfig) {
    tracing::debug!(
        max_reruns = config.max_reruns,
        max_errors = config.max_errors,
        "runtime reconfigured"
    );
    CONFIG.with(|current| *current.borrow_mut() = config);
}

/// The current thread's runtime configuration.
pub fn config() -> RuntimeConfig {
    CONFIG.with(|current| current.borrow().clone())
}
