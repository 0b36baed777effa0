//! Reactive Core
//!
//! This crate provides a fine-grained reactive state engine. It implements:
//!
//! - Reactive containers over records and lists, wrapped lazily in depth
//! - Derived values that cache and recompute only when read after a change
//! - Effects that re-run when anything they read changes
//! - Watchers over explicit property paths
//! - Batching, so several writes produce one run per subscriber
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: containers, subscribers and the per-thread runtime
//! - `graph`: dependency graph and update scheduler
//! - `config`: runtime tunables
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust,ignore
//! use reactive_core::reactive::{Container, Effect};
//! use serde_json::json;
//!
//! // Wrap some state
//! let state = Container::from_json(json!({"count": 0}))?;
//!
//! // Define a derived property
//! state.define_derived("doubled", |s| {
//!     Ok((s.get("count")?.as_i64().unwrap_or(0) * 2).into())
//! })?;
//!
//! // Create an effect
//! let effect = Effect::new({
//!     let state = state.clone();
//!     move || {
//!         println!("Doubled: {}", state.get("doubled")?);
//!         Ok(())
//!     }
//! })?;
//!
//! // Update the state
//! state.set("count", 5)?;
//! // Effect automatically runs, prints: "Doubled: 10"
//! effect.dispose();
//! ```

// Handles share state through `Arc` but are confined to one thread.
#![allow(clippy::arc_with_non_send_sync)]

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{configure, RuntimeConfig};
pub use error::{ReactiveError, Result};
pub use reactive::{
    batch, untrack, watch, watch_map, watch_with, wrap, Computed, Container, Effect, Path,
    Runtime, Value, WatchOptions, Watcher,
};
