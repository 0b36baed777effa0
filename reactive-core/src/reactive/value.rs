//! Values and property paths.
//!
//! [`Value`] is what a container slot holds once it has been read:
//! a primitive, or a handle to a child container. Primitives compare by
//! value; containers compare by identity, so replacing a record with an
//! equal-looking new record still counts as a change.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use smallvec::SmallVec;

use super::container::Container;
use crate::error::{ReactiveError, Result};
use crate::graph::SourceId;

/// A value stored in or read from a container.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Container(Container),
}

impl Value {
    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Text(_) => "string",
            Value::Container(container) if container.is_list() => "list",
            Value::Container(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a container rather than a primitive.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Container(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(container) => Some(container),
            _ => None,
        }
    }

    /// Deep JSON snapshot. Reads through child containers are tracked.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_within(&mut Vec::new())
    }

    pub(crate) fn to_json_within(&self, ancestors: &mut Vec<SourceId>) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Container(container) => container.to_json_within(ancestors),
        }
    }

    /// Convert a primitive JSON value. Returns `None` for objects and arrays.
    pub(crate) fn from_json_primitive(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Container(container) => write!(f, "{container:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::Container(container)
    }
}

impl From<&Container> for Value {
    fn from(container: &Container) -> Self {
        Value::Container(container.clone())
    }
}

/// Structured JSON is wrapped into a fresh container whose own children
/// stay raw until first read.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match Value::from_json_primitive(&json) {
            Some(value) => value,
            None => Value::Container(Container::from_structured(json)),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A dotted property path such as `user.name` or `items.0.title`.
///
/// Segments are resolved against the container they land on: on a list a
/// segment must be a decimal index, on a record it is a field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: SmallVec<[Arc<str>; 4]>,
}

// A parsed path always has at least one segment.
#[allow(clippy::len_without_is_empty)]
impl Path {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: SmallVec<[Arc<str>; 4]> = path.split('.').map(Arc::from).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ReactiveError::InvalidPath {
                path: path.to_owned(),
                reason: "empty segment".into(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Arc<str>] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// The path without its last segment, and the last segment.
    pub fn split_last(&self) -> Option<(&[Arc<str>], &Arc<str>)> {
        self.segments
            .split_last()
            .map(|(last, parent)| (parent, last))
    }
}

impl FromStr for Path {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}
