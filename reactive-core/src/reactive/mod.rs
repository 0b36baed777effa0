//! Reactive Primitives
//!
//! This module implements the reactive engine: containers, derived values,
//! effects, watchers and batching.
//!
//! # Concepts
//!
//! ## Containers
//!
//! A [`Container`] wraps a record or list of plain data. Reading a property
//! inside a tracking scope registers the running subscriber on that
//! property's cell; writing the property notifies every subscriber of the
//! cell. Nested records and lists are wrapped lazily on first read, and the
//! same child is returned on every read until it is replaced.
//!
//! ## Derived values
//!
//! A [`Computed`] caches the result of a function over reactive reads. It
//! is lazy: a change only marks it dirty, and the next read recomputes.
//! Containers can also carry named derived properties that read like plain
//! fields.
//!
//! ## Effects and watchers
//!
//! An [`Effect`] runs a function immediately and re-runs it whenever
//! anything it read changes. A [`Watcher`] observes explicit paths on a
//! container and receives `(new, old, path)` for each change.
//!
//! ## Batching
//!
//! [`batch`] defers effect and watcher runs until the outermost batch ends,
//! so several writes produce one run per subscriber.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local tracking context to detect dependencies
//! automatically. When a property is read, we check if there is an active
//! tracking scope and, if so, record the edge in the dependency graph.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod batch;
mod computed;
mod container;
mod context;
mod effect;
mod runtime;
mod subscriber;
mod value;
mod watch;

pub use batch::{batch, BatchScope};
pub use computed::{Computed, DerivedState};
pub use container::{wrap, Container};
pub use context::{untrack, ReactiveContext};
pub use effect::Effect;
pub use runtime::{Reactive, Runtime};
pub use subscriber::{SubscriberId, SubscriberKind};
pub use value::{Path, Value};
pub use watch::{watch, watch_map, watch_with, WatchCallback, WatchOptions, Watcher};
