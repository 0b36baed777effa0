//! Reactive Container
//!
//! A container wraps a record or a list. Every read through the handle is
//! recorded against the dependency graph and every write notifies the
//! subscribers of the cells it touched.
//!
//! # How Containers Work
//!
//! 1. Each container has a [`SourceId`]; its cells are `(id, field)`,
//!    `(id, index)` and the synthetic `(id, shape)` cell.
//!
//! 2. Structured children arrive as raw JSON and stay raw until first read.
//!    The first read wraps the child into its own container and caches the
//!    handle in the slot, so later reads return the same identity and the
//!    graph keys stay stable.
//!
//! 3. A write that stores a value equal to the current one (by value for
//!    primitives, by identity for containers) notifies nobody.
//!
//! 4. Adding or removing a record field and every structural list
//!    operation also write the shape cell, so readers of `len`, `keys` or
//!    the whole collection hear about it.
//!
//! # Memory
//!
//! The graph stores only identities. When the last handle of a container
//! drops, its cells are removed from the graph.
//!
//! # Threads
//!
//! The dependency graph is per thread, so a container is neither `Send` nor
//! `Sync`: a write from another thread could not reach the subscribers
//! tracking it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Serializer};

use super::computed::Computed;
use super::context::untrack;
use super::runtime::Runtime;
use super::value::{Path, Value};
use crate::error::{ReactiveError, Result};
use crate::graph::{Cell, Key, SourceId};

/// A slot in a container: either a value already handed out, or a raw
/// structured child not yet wrapped.
#[derive(Debug)]
enum Slot {
    Raw(serde_json::Value),
    Ready(Value),
}

impl Slot {
    fn from_json(json: serde_json::Value) -> Self {
        match Value::from_json_primitive(&json) {
            Some(value) => Slot::Ready(value),
            None => Slot::Raw(json),
        }
    }

    /// Wrap a raw child on first access and cache the handle.
    fn materialize(&mut self) -> Value {
        if let Slot::Raw(json) = self {
            let child = Container::from_structured(std::mem::take(json));
            *self = Slot::Ready(Value::Container(child));
        }
        match self {
            Slot::Ready(value) => value.clone(),
            Slot::Raw(_) => Value::Null,
        }
    }

    /// Whether storing `value` here would be a no-op. A raw child has not
    /// been handed out yet, so nothing can be identical to it.
    fn holds(&self, value: &Value) -> bool {
        match self {
            Slot::Ready(current) => current == value,
            Slot::Raw(_) => false,
        }
    }
}

#[derive(Debug)]
enum Data {
    Record(IndexMap<Arc<str>, Slot>),
    List(Vec<Slot>),
}

impl Data {
    fn shape_name(&self) -> &'static str {
        match self {
            Data::Record(_) => "record",
            Data::List(_) => "list",
        }
    }

    fn len(&self) -> usize {
        match self {
            Data::Record(fields) => fields.len(),
            Data::List(items) => items.len(),
        }
    }

    /// Cells for every key currently present.
    fn key_cells(&self, source: SourceId) -> Vec<Cell> {
        match self {
            Data::Record(fields) => fields
                .keys()
                .map(|name| Cell::new(source, Key::Field(name.clone())))
                .collect(),
            Data::List(items) => (0..items.len())
                .map(|index| Cell::new(source, Key::Index(index)))
                .collect(),
        }
    }
}

struct ContainerInner {
    id: SourceId,
    data: Mutex<Data>,
    derived: RwLock<IndexMap<Arc<str>, Computed<Value>>>,
    /// Confined to the thread whose runtime tracks it.
    _thread: PhantomData<*const ()>,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        Runtime::forget_source(self.id);
    }
}

/// Handle to a reactive record or list.
///
/// Cloning a handle is cheap and yields the same container.
///
/// # Example
///
/// ```rust,ignore
/// let state = Container::from_json(json!({"count": 0}))?;
///
/// Effect::new({
///     let state = state.clone();
///     move || {
///         println!("count = {}", state.get("count")?);
///         Ok(())
///     }
/// })?;
///
/// state.set("count", 5)?; // prints "count = 5"
/// ```
///
/// Handles stay on the thread that created them:
///
/// ```compile_fail
/// let state = reactive_core::Container::record();
/// std::thread::spawn(move || state.set("x", 1));
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    fn with_data(data: Data) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: SourceId::new(),
                data: Mutex::new(data),
                derived: RwLock::new(IndexMap::new()),
                _thread: PhantomData,
            }),
        }
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::with_data(Data::Record(IndexMap::new()))
    }

    /// An empty list.
    pub fn list() -> Self {
        Self::with_data(Data::List(Vec::new()))
    }

    /// Wrap a JSON object or array.
    ///
    /// Primitive JSON cannot be wrapped on its own.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from_json_primitive(&json) {
            Some(primitive) => Err(ReactiveError::NotStructured {
                kind: primitive.kind_name(),
            }),
            None => Ok(Self::from_structured(json)),
        }
    }

    /// Wrap an object or array. Anything else becomes an empty record.
    pub(crate) fn from_structured(json: serde_json::Value) -> Self {
        let data = match json {
            serde_json::Value::Array(items) => {
                Data::List(items.into_iter().map(Slot::from_json).collect())
            }
            serde_json::Value::Object(fields) => Data::Record(
                fields
                    .into_iter()
                    .map(|(name, json)| (Arc::from(name), Slot::from_json(json)))
                    .collect(),
            ),
            _ => Data::Record(IndexMap::new()),
        };
        Self::with_data(data)
    }

    /// Return the container behind `value`.
    ///
    /// Wrapping an already-reactive value returns the same handle.
    pub fn wrap(value: impl Into<Value>) -> Result<Self> {
        match value.into() {
            Value::Container(container) => Ok(container),
            other => Err(ReactiveError::NotStructured {
                kind: other.kind_name(),
            }),
        }
    }

    /// The identity of this container in the dependency graph.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_list(&self) -> bool {
        matches!(*self.inner.data.lock(), Data::List(_))
    }

    pub fn is_record(&self) -> bool {
        !self.is_list()
    }

    fn cell(&self, key: Key) -> Cell {
        Cell::new(self.inner.id, key)
    }

    fn derived_for(&self, key: &Key) -> Option<Computed<Value>> {
        match key {
            Key::Field(name) => self.inner.derived.read().get(name).cloned(),
            _ => None,
        }
    }

    fn mismatch(key: &Key, shape: &'static str) -> ReactiveError {
        ReactiveError::KeyMismatch {
            key: key.to_string(),
            shape,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a property, registering the current subscriber on its cell.
    ///
    /// Missing fields and indices past the end read as [`Value::Null`].
    /// Derived properties compute (or return their cache) on read.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        if let Some(derived) = self.derived_for(&key) {
            return derived.get();
        }

        let mut data = self.inner.data.lock();
        let value = match (&mut *data, &key) {
            (Data::Record(fields), Key::Field(name)) => {
                fields.get_mut(name).map_or(Value::Null, Slot::materialize)
            }
            (Data::List(items), Key::Index(index)) => {
                items.get_mut(*index).map_or(Value::Null, Slot::materialize)
            }
            (data, key) => return Err(Self::mismatch(key, data.shape_name())),
        };
        drop(data);

        Runtime::track(self.cell(key));
        Ok(value)
    }

    /// Read a property without registering a dependency.
    pub fn get_untracked(&self, key: impl Into<Key>) -> Result<Value> {
        untrack(|| self.get(key))
    }

    /// Read a dotted path, tracking every hop along the way.
    ///
    /// A path that runs into `null` part way resolves to `null`; a path
    /// that runs into another primitive is an error.
    pub fn get_path(&self, path: &str) -> Result<Value> {
        self.resolve(&Path::parse(path)?)
    }

    /// Read a parsed path, tracking every hop along the way.
    pub fn resolve(&self, path: &Path) -> Result<Value> {
        let mut current = Value::Container(self.clone());
        for segment in path.segments() {
            let container = match &current {
                Value::Container(container) => container.clone(),
                Value::Null => return Ok(Value::Null),
                other => {
                    return Err(ReactiveError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("`{segment}` is read from a {}", other.kind_name()),
                    })
                }
            };
            let key = container.key_for(segment, path)?;
            current = container.get(key)?;
        }
        Ok(current)
    }

    /// Turn a path segment into a key for this container's shape.
    fn key_for(&self, segment: &str, path: &Path) -> Result<Key> {
        if !self.is_list() {
            return Ok(Key::field(segment));
        }
        if self.inner.derived.read().contains_key(segment) {
            return Ok(Key::field(segment));
        }
        segment
            .parse::<usize>()
            .map(Key::Index)
            .map_err(|_| ReactiveError::InvalidPath {
                path: path.to_string(),
                reason: format!("`{segment}` is not a list index"),
            })
    }

    /// Whether a record field (or derived property) exists.
    pub fn contains_key(&self, name: &str) -> bool {
        if self.inner.derived.read().contains_key(name) {
            return true;
        }
        let present = match &*self.inner.data.lock() {
            Data::Record(fields) => fields.contains_key(name),
            Data::List(_) => false,
        };
        Runtime::track(self.cell(Key::field(name)));
        present
    }

    /// Number of fields or items. Tracks the shape cell.
    pub fn len(&self) -> usize {
        let len = self.inner.data.lock().len();
        Runtime::track(self.cell(Key::Shape));
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record field names in insertion order (empty for lists). Tracks the
    /// shape cell.
    pub fn keys(&self) -> Vec<String> {
        let keys = match &*self.inner.data.lock() {
            Data::Record(fields) => fields.keys().map(|name| name.to_string()).collect(),
            Data::List(_) => Vec::new(),
        };
        Runtime::track(self.cell(Key::Shape));
        keys
    }

    /// Every value in order. Tracks the shape cell and every element.
    pub fn values(&self) -> Vec<Value> {
        let (values, cells) = {
            let mut data = self.inner.data.lock();
            let cells = data.key_cells(self.inner.id);
            let values = match &mut *data {
                Data::Record(fields) => fields.values_mut().map(Slot::materialize).collect(),
                Data::List(items) => items.iter_mut().map(Slot::materialize).collect(),
            };
            (values, cells)
        };
        Runtime::track(self.cell(Key::Shape));
        for cell in cells {
            Runtime::track(cell);
        }
        values
    }

    /// Deep JSON snapshot of the data (derived properties excluded).
    ///
    /// Tracks the shape and every element of every container it visits, so
    /// an effect serializing state re-runs on any nested change. A container
    /// that contains itself is written as `null` where it recurs.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_within(&mut Vec::new())
    }

    /// `to_json` with the chain of containers currently being serialized.
    pub(crate) fn to_json_within(&self, ancestors: &mut Vec<SourceId>) -> serde_json::Value {
        if ancestors.contains(&self.inner.id) {
            tracing::warn!(source = self.inner.id.raw(), "container contains itself; written as null");
            return serde_json::Value::Null;
        }

        let entries: Vec<(Option<Arc<str>>, Value)> = {
            let mut data = self.inner.data.lock();
            match &mut *data {
                Data::Record(fields) => fields
                    .iter_mut()
                    .map(|(name, slot)| (Some(name.clone()), slot.materialize()))
                    .collect(),
                Data::List(items) => items.iter_mut().map(|slot| (None, slot.materialize())).collect(),
            }
        };

        Runtime::track(self.cell(Key::Shape));
        ancestors.push(self.inner.id);
        let json = if self.is_list() {
            let mut items = Vec::with_capacity(entries.len());
            for (index, (_, value)) in entries.into_iter().enumerate() {
                Runtime::track(self.cell(Key::Index(index)));
                items.push(value.to_json_within(ancestors));
            }
            serde_json::Value::Array(items)
        } else {
            let mut fields = serde_json::Map::new();
            for (name, value) in entries {
                let Some(name) = name else { continue };
                Runtime::track(self.cell(Key::Field(name.clone())));
                fields.insert(name.to_string(), value.to_json_within(ancestors));
            }
            serde_json::Value::Object(fields)
        };
        ancestors.pop();
        json
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write a property and notify its subscribers.
    ///
    /// Writing a value equal to the current one is a no-op. Adding a new
    /// record field, or writing one past the end of a list, also writes the
    /// shape cell.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        if let Key::Field(name) = &key {
            if self.inner.derived.read().contains_key(name) {
                return Err(ReactiveError::ReadOnlyDerived {
                    name: name.to_string(),
                });
            }
        }

        let (cells, replaced) = {
            let mut data = self.inner.data.lock();
            match (&mut *data, &key) {
                (Data::Record(fields), Key::Field(name)) => match fields.get_mut(name) {
                    Some(slot) if slot.holds(&value) => return Ok(()),
                    Some(slot) => {
                        let old = std::mem::replace(slot, Slot::Ready(value));
                        (vec![self.cell(key.clone())], Some(old))
                    }
                    None => {
                        fields.insert(name.clone(), Slot::Ready(value));
                        (vec![self.cell(key.clone()), self.cell(Key::Shape)], None)
                    }
                },
                (Data::List(items), Key::Index(index)) => {
                    let (index, len) = (*index, items.len());
                    if index < len {
                        if items[index].holds(&value) {
                            return Ok(());
                        }
                        let old = std::mem::replace(&mut items[index], Slot::Ready(value));
                        (vec![self.cell(key.clone())], Some(old))
                    } else if index == len {
                        items.push(Slot::Ready(value));
                        (vec![self.cell(key.clone()), self.cell(Key::Shape)], None)
                    } else {
                        return Err(ReactiveError::IndexOutOfBounds { index, len });
                    }
                }
                (data, key) => return Err(Self::mismatch(key, data.shape_name())),
            }
        };
        // Released outside the lock: dropping a child container touches
        // the runtime.
        drop(replaced);

        tracing::trace!(source = self.inner.id.raw(), %key, "write");
        Runtime::notify(cells);
        Ok(())
    }

    /// Write through a dotted path. Every segment but the last must
    /// resolve to a container.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let parsed = Path::parse(path)?;
        let Some((parents, last)) = parsed.split_last() else {
            return Err(ReactiveError::InvalidPath {
                path: path.to_owned(),
                reason: "empty path".into(),
            });
        };

        let mut target = self.clone();
        for segment in parents {
            let key = target.key_for(segment, &parsed)?;
            target = match target.get_untracked(key)? {
                Value::Container(child) => child,
                other => {
                    return Err(ReactiveError::InvalidPath {
                        path: path.to_owned(),
                        reason: format!("`{segment}` is a {}", other.kind_name()),
                    })
                }
            };
        }
        let key = target.key_for(last, &parsed)?;
        target.set(key, value)
    }

    /// Replace a property with a function of its current value. The read
    /// is not tracked.
    pub fn update<V: Into<Value>>(
        &self,
        key: impl Into<Key>,
        f: impl FnOnce(&Value) -> V,
    ) -> Result<()> {
        let key = key.into();
        let current = self.get_untracked(key.clone())?;
        self.set(key, f(&current))
    }

    /// Remove a record field, returning its value. Writes the field and the
    /// shape cell when something was removed.
    pub fn delete(&self, name: &str) -> Result<Value> {
        if self.inner.derived.read().contains_key(name) {
            return Err(ReactiveError::ReadOnlyDerived {
                name: name.to_owned(),
            });
        }
        let removed = {
            let mut data = self.inner.data.lock();
            match &mut *data {
                Data::Record(fields) => fields.shift_remove(name),
                Data::List(_) => return Err(Self::mismatch(&Key::field(name), "list")),
            }
        };
        let Some(mut slot) = removed else {
            return Ok(Value::Null);
        };

        let value = slot.materialize();
        Runtime::notify(vec![self.cell(Key::field(name)), self.cell(Key::Shape)]);
        Ok(value)
    }

    /// Apply a structural list operation and notify the touched cells.
    ///
    /// `op` returns the changed indices and its result; `None` means nothing
    /// changed and nobody is notified.
    fn mutate_list<R>(
        &self,
        op: impl FnOnce(&mut Vec<Slot>) -> Result<Option<(Vec<usize>, R)>>,
    ) -> Result<Option<R>> {
        let outcome = {
            let mut data = self.inner.data.lock();
            match &mut *data {
                Data::List(items) => op(items)?,
                Data::Record(_) => {
                    return Err(ReactiveError::KeyMismatch {
                        key: "<list operation>".into(),
                        shape: "record",
                    })
                }
            }
        };
        let Some((indices, result)) = outcome else {
            return Ok(None);
        };

        let mut cells: Vec<Cell> = indices
            .into_iter()
            .map(|index| self.cell(Key::Index(index)))
            .collect();
        cells.push(self.cell(Key::Shape));
        tracing::trace!(source = self.inner.id.raw(), cells = cells.len(), "list mutation");
        Runtime::notify(cells);
        Ok(Some(result))
    }

    /// Append to a list.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate_list(|items| {
            items.push(Slot::Ready(value));
            Ok(Some((vec![items.len() - 1], ())))
        })
        .map(|_| ())
    }

    /// Remove and return the last item, or `Null` for an empty list.
    pub fn pop(&self) -> Result<Value> {
        let popped = self.mutate_list(|items| {
            Ok(items.pop().map(|mut slot| (vec![items.len()], slot.materialize())))
        })?;
        Ok(popped.unwrap_or_default())
    }

    /// Insert at `index`, shifting later items.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate_list(|items| {
            let len = items.len();
            if index > len {
                return Err(ReactiveError::IndexOutOfBounds { index, len });
            }
            items.insert(index, Slot::Ready(value));
            Ok(Some(((index..=len).collect(), ())))
        })
        .map(|_| ())
    }

    /// Remove the item at `index`, shifting later items.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let removed = self.mutate_list(|items| {
            let len = items.len();
            if index >= len {
                return Err(ReactiveError::IndexOutOfBounds { index, len });
            }
            let mut slot = items.remove(index);
            Ok(Some(((index..len).collect(), slot.materialize())))
        })?;
        Ok(removed.unwrap_or_default())
    }

    /// Swap two items.
    pub fn swap(&self, a: usize, b: usize) -> Result<()> {
        self.mutate_list(|items| {
            let len = items.len();
            for index in [a, b] {
                if index >= len {
                    return Err(ReactiveError::IndexOutOfBounds { index, len });
                }
            }
            if a == b {
                return Ok(None);
            }
            items.swap(a, b);
            Ok(Some((vec![a, b], ())))
        })
        .map(|_| ())
    }

    /// Reverse the list in place.
    pub fn reverse(&self) -> Result<()> {
        self.mutate_list(|items| {
            if items.len() < 2 {
                return Ok(None);
            }
            items.reverse();
            Ok(Some(((0..items.len()).collect(), ())))
        })
        .map(|_| ())
    }

    /// Remove every field or item.
    pub fn clear(&self) -> Result<()> {
        let (mut cells, removed) = {
            let mut data = self.inner.data.lock();
            if data.len() == 0 {
                return Ok(());
            }
            let cells = data.key_cells(self.inner.id);
            let empty = match &*data {
                Data::Record(_) => Data::Record(IndexMap::new()),
                Data::List(_) => Data::List(Vec::new()),
            };
            (cells, std::mem::replace(&mut *data, empty))
        };
        drop(removed);

        cells.push(self.cell(Key::Shape));
        Runtime::notify(cells);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derived properties
    // ------------------------------------------------------------------

    /// Register a read-only property computed from this container.
    ///
    /// The function receives the container itself and may read sibling
    /// fields and other derived properties. It runs lazily on first read
    /// and again only after one of its dependencies changed.
    pub fn define_derived<F>(&self, name: &str, compute: F) -> Result<()>
    where
        F: Fn(&Container) -> Result<Value> + 'static,
    {
        let exists = match &*self.inner.data.lock() {
            Data::Record(fields) => fields.contains_key(name),
            Data::List(_) => false,
        };
        let mut derived = self.inner.derived.write();
        if exists || derived.contains_key(name) {
            return Err(ReactiveError::DerivedConflict {
                name: name.to_owned(),
            });
        }

        let owner: Weak<ContainerInner> = Arc::downgrade(&self.inner);
        let computed = Computed::named(name, move || {
            let inner = owner.upgrade().ok_or(ReactiveError::ContainerDropped)?;
            compute(&Container { inner })
        });
        derived.insert(Arc::from(name), computed);
        tracing::debug!(source = self.inner.id.raw(), name, "derived property defined");
        Ok(())
    }

    /// The derived value registered under `name`, if any.
    pub fn derived(&self, name: &str) -> Option<Computed<Value>> {
        self.inner.derived.read().get(name).cloned()
    }

    /// Names of the derived properties, in definition order.
    pub fn derived_names(&self) -> Vec<String> {
        self.inner
            .derived
            .read()
            .keys()
            .map(|name| name.to_string())
            .collect()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (shape, len) = {
            let data = self.inner.data.lock();
            (data.shape_name(), data.len())
        };
        f.debug_struct("Container")
            .field("id", &self.inner.id.raw())
            .field("shape", &shape)
            .field("len", &len)
            .finish()
    }
}

/// Serializes an untracked snapshot of the data.
impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        untrack(|| self.to_json()).serialize(serializer)
    }
}

/// Wrap a value for use with the engine.
///
/// Structured JSON becomes a container; primitives pass through unchanged,
/// and a value that already holds a container keeps the same handle.
pub fn wrap(value: impl Into<Value>) -> Value {
    value.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitive_json_is_rejected() {
        assert_eq!(
            Container::from_json(json!(5)).unwrap_err(),
            ReactiveError::NotStructured { kind: "number" }
        );
        assert!(Container::wrap(Value::from("x")).is_err());
    }

    #[test]
    fn wrap_returns_same_handle() {
        let state = Container::record();
        let again = Container::wrap(&state).unwrap();
        assert!(state.ptr_eq(&again));

        assert_eq!(wrap(3), Value::Int(3));
        let value = wrap(Value::from(&state));
        assert!(value.as_container().unwrap().ptr_eq(&state));
    }

    #[test]
    fn nested_children_keep_identity() {
        let state = Container::from_json(json!({"user": {"name": "A"}})).unwrap();
        let first = state.get("user").unwrap();
        let second = state.get("user").unwrap();
        assert_eq!(first, second);

        let user = first.as_container().unwrap();
        assert_eq!(user.get("name").unwrap(), Value::from("A"));
    }

    #[test]
    fn missing_keys_read_as_null() {
        let state = Container::from_json(json!({"a": 1})).unwrap();
        assert!(state.get("missing").unwrap().is_null());

        let list = Container::from_json(json!([1])).unwrap();
        assert!(list.get(5usize).unwrap().is_null());
    }

    #[test]
    fn key_kind_must_match_shape() {
        let list = Container::list();
        assert!(matches!(
            list.get("name"),
            Err(ReactiveError::KeyMismatch { shape: "list", .. })
        ));
        let record = Container::record();
        assert!(matches!(
            record.set(0usize, 1),
            Err(ReactiveError::KeyMismatch { shape: "record", .. })
        ));
    }

    #[test]
    fn list_operations() {
        let list = Container::from_json(json!([1, 2, 3])).unwrap();

        list.push(4).unwrap();
        list.insert(0, 0).unwrap();
        assert_eq!(list.to_json(), json!([0, 1, 2, 3, 4]));

        assert_eq!(list.remove(1).unwrap(), Value::Int(1));
        assert_eq!(list.pop().unwrap(), Value::Int(4));
        list.swap(0, 2).unwrap();
        assert_eq!(list.to_json(), json!([3, 2, 0]));

        list.reverse().unwrap();
        assert_eq!(list.to_json(), json!([0, 2, 3]));

        assert!(matches!(
            list.insert(9, 1),
            Err(ReactiveError::IndexOutOfBounds { index: 9, len: 3 })
        ));
        assert!(matches!(
            list.set(7usize, 1),
            Err(ReactiveError::IndexOutOfBounds { index: 7, len: 3 })
        ));

        list.set(3usize, 9).unwrap();
        assert_eq!(list.len(), 4);

        list.clear().unwrap();
        assert!(list.is_empty());
        assert!(list.pop().unwrap().is_null());
    }

    #[test]
    fn record_operations() {
        let state = Container::from_json(json!({"a": 1, "b": {"c": [true]}})).unwrap();

        assert_eq!(state.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(state.get_path("b.c.0").unwrap(), Value::Bool(true));

        state.set_path("b.c.0", false).unwrap();
        assert_eq!(state.get_path("b.c.0").unwrap(), Value::Bool(false));

        state.update("a", |v| v.as_i64().unwrap_or(0) + 1).unwrap();
        assert_eq!(state.get("a").unwrap(), Value::Int(2));

        assert_eq!(state.delete("a").unwrap(), Value::Int(2));
        assert!(!state.contains_key("a"));
        assert!(state.delete("a").unwrap().is_null());

        assert!(state.get_path("b.c.x").is_err());
        assert!(state.get_path("missing.deep").unwrap().is_null());
        assert!(state.set_path("b.c.0.x", 1).is_err());
    }

    #[test]
    fn derived_property_is_read_only() {
        let state = Container::from_json(json!({"count": 2})).unwrap();
        state
            .define_derived("doubled", |s| {
                Ok(Value::from(s.get("count")?.as_i64().unwrap_or(0) * 2))
            })
            .unwrap();

        assert_eq!(state.get("doubled").unwrap(), Value::Int(4));
        assert!(state.contains_key("doubled"));
        assert_eq!(
            state.set("doubled", 1).unwrap_err(),
            ReactiveError::ReadOnlyDerived {
                name: "doubled".into()
            }
        );
        assert!(matches!(
            state.define_derived("count", |_| Ok(Value::Null)),
            Err(ReactiveError::DerivedConflict { .. })
        ));
        assert_eq!(state.derived_names(), vec!["doubled".to_string()]);
    }

    #[test]
    fn serialize_matches_snapshot() {
        let state = Container::from_json(json!({"name": "A", "tags": ["x"]})).unwrap();
        let text = serde_json::to_string(&state).unwrap();
        assert_eq!(text, r#"{"name":"A","tags":["x"]}"#);
    }

    #[test]
    fn snapshot_writes_self_reference_as_null() {
        let state = Container::from_json(json!({"name": "root", "items": []})).unwrap();
        state.set("me", &state).unwrap();
        let items = state.get("items").unwrap().as_container().cloned().unwrap();
        items.push(&state).unwrap();

        assert_eq!(
            state.to_json(),
            json!({"name": "root", "items": [null], "me": null})
        );

        items.clear().unwrap();
        state.delete("me").unwrap();
    }

    #[test]
    fn shared_child_is_written_in_full_each_time() {
        let shared = Container::from_json(json!({"v": 1})).unwrap();
        let state = Container::record();
        state.set("a", &shared).unwrap();
        state.set("b", &shared).unwrap();

        assert_eq!(state.to_json(), json!({"a": {"v": 1}, "b": {"v": 1}}));
    }

    #[test]
    fn dropping_container_forgets_its_cells() {
        let subscriber = crate::reactive::SubscriberId::new();
        let state = Container::from_json(json!({"a": 1})).unwrap();
        let cell = Cell::new(state.id(), Key::from("a"));
        {
            let _ctx = crate::reactive::ReactiveContext::enter(subscriber);
            state.get("a").unwrap();
        }
        assert_eq!(Runtime::subscriber_count(&cell), 1);

        drop(state);
        assert_eq!(Runtime::subscriber_count(&cell), 0);
        assert_eq!(Runtime::dependency_count(subscriber), 0);
    }
}
