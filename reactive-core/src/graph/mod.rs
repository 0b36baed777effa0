//! Dependency Graph
//!
//! This module implements the bookkeeping that connects reactive state to
//! the computations reading it.
//!
//! # Overview
//!
//! - A [`Cell`] is one property of one source (container or derived value).
//! - The [`DependencyGraph`] maps cells to the subscribers that read them
//!   during their latest run, and subscribers back to their cells.
//! - The [`UpdateScheduler`] holds subscribers waiting to re-run and the
//!   batch nesting counter.
//!
//! # Design Decisions
//!
//! 1. Edges are keyed by identity, never by the data itself, so tracking a
//!    cell does not keep the container alive.
//!
//! 2. Both directions are stored. Forward edges make notification a lookup;
//!    reverse edges make "clear then re-track" cheap before every re-run.
//!
//! 3. The graph has no execution policy. It reports who is affected and the
//!    runtime decides whether to invalidate, queue or run.

mod cell;
mod dependency;
mod scheduler;

pub use cell::{Cell, Key, SourceId};
pub use dependency::DependencyGraph;
pub use scheduler::UpdateScheduler;
