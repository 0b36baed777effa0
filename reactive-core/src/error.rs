//! Error types for the reactive engine.
//!
//! Configuration errors (writing a derived property, a derived cycle, wrapping
//! a primitive) are returned synchronously at the point of misuse. Errors from
//! subscriber bodies are returned on the first synchronous run and reported
//! through [`Runtime::take_errors`](crate::reactive::Runtime::take_errors) on
//! scheduled re-runs.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors produced by the reactive engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// Attempted to assign to a derived property.
    #[error("derived property `{name}` is read-only")]
    ReadOnlyDerived { name: String },

    /// A derived value re-entered its own computation.
    #[error("derived value `{name}` depends on itself")]
    DerivedCycle { name: String },

    /// A derived property was declared over an existing field or derived.
    #[error("`{name}` is already defined on this container")]
    DerivedConflict { name: String },

    /// Only records and lists can be wrapped into a container.
    #[error("cannot wrap a {kind} value; only records and lists are reactive")]
    NotStructured { kind: &'static str },

    /// A record key was used on a list or an index on a record.
    #[error("key `{key}` does not address a {shape}")]
    KeyMismatch { key: String, shape: &'static str },

    /// A list index past the end of the list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A property path that does not resolve through the data.
    #[error("path `{path}` does not resolve: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A derived property outlived the container it was defined on.
    #[error("container was dropped")]
    ContainerDropped,

    /// A subscriber kept re-triggering itself without settling.
    #[error("subscriber {subscriber:?} did not converge after {runs} runs")]
    NonConvergent { subscriber: SubscriberId, runs: usize },

    /// An error raised by caller code inside an effect, watcher or derived.
    #[error("{message}")]
    Callback { message: String },
}

impl ReactiveError {
    /// Build a [`ReactiveError::Callback`] from any displayable error.
    pub fn callback(message: impl std::fmt::Display) -> Self {
        Self::Callback {
            message: message.to_string(),
        }
    }

    /// Whether this error is a misuse of the engine rather than a failure
    /// inside caller code.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ReadOnlyDerived { .. }
                | Self::DerivedCycle { .. }
                | Self::DerivedConflict { .. }
                | Self::NotStructured { .. }
        )
    }
}
