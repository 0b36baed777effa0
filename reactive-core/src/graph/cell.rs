//! Cells
//!
//! A cell is the unit of dependency tracking: one property of one source.
//! Cells are never materialized as objects; they are plain keys into the
//! dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of something that owns cells: a container or a derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which property of a source a cell refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// A named record field.
    Field(Arc<str>),
    /// A list position.
    Index(usize),
    /// The synthetic size/shape cell, written by structural mutations.
    Shape,
    /// The value of a derived computation.
    Value,
}

impl Key {
    /// Build a field key.
    pub fn field(name: impl AsRef<str>) -> Self {
        Self::Field(Arc::from(name.as_ref()))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Field(Arc::from(name))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Shape => f.write_str("<shape>"),
            Key::Value => f.write_str("<value>"),
        }
    }
}

/// A trackable cell: `(source, key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub source: SourceId,
    pub key: Key,
}

impl Cell {
    pub fn new(source: SourceId, key: Key) -> Self {
        Self { source, key }
    }

    /// The shape cell of a source.
    pub fn shape(source: SourceId) -> Self {
        Self::new(source, Key::Shape)
    }
}
