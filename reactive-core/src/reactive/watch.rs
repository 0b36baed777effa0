//! Watchers
//!
//! A watcher observes explicit property paths on one container and receives
//! `(new, old, path)` for every path whose value changed.
//!
//! Unlike an effect, a watcher never runs arbitrary code to discover what it
//! depends on: its paths are declared up front. On each notification it
//! re-resolves those paths (tracking every hop, so replacing an intermediate
//! container is noticed), compares each result with the last value it saw,
//! and invokes the callback once per changed path. Callbacks run untracked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::container::Container;
use super::context::{untrack, ReactiveContext};
use super::effect::RunningGuard;
use super::runtime::{Reactive, RegistrationGuard, Runtime};
use super::subscriber::{SubscriberId, SubscriberKind};
use super::value::{Path, Value};
use crate::config;
use crate::error::{ReactiveError, Result};

/// Callback invoked with `(new, old, path)`.
pub type WatchCallback = Arc<dyn Fn(&Value, &Value, &Path) -> Result<()>>;

/// Options for [`watch_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Fire once at registration with `(current, Null)` for every path.
    pub immediate: bool,
}

struct WatchEntry {
    path: Path,
    last: Value,
    callback: WatchCallback,
}

struct WatcherInner {
    subscriber_id: SubscriberId,
    target: Container,
    entries: Mutex<Vec<WatchEntry>>,
    running: AtomicBool,
    pending: AtomicBool,
    disposed: AtomicBool,
}

impl WatcherInner {
    /// Re-resolve every watched path under this watcher's tracking scope.
    fn resolve(&self, paths: &[Path]) -> Vec<Result<Value>> {
        Runtime::untrack_all(self.subscriber_id);
        let _ctx = ReactiveContext::enter(self.subscriber_id);
        paths.iter().map(|path| self.target.resolve(path)).collect()
    }

    fn paths(&self) -> Vec<Path> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Record the current values without firing anything.
    fn prime(&self, immediate: bool) -> Result<()> {
        let paths = self.paths();
        let current = self.resolve(&paths);

        let mut fired = Vec::new();
        {
            let mut entries = self.entries.lock();
            for (entry, value) in entries.iter_mut().zip(current) {
                entry.last = value?;
                if immediate {
                    fired.push((entry.path.clone(), entry.last.clone(), entry.callback.clone()));
                }
            }
        }
        for (path, value, callback) in fired {
            untrack(|| callback(&value, &Value::Null, &path))?;
        }
        Ok(())
    }

    /// One pass: compare every path with its last value and fire changes.
    fn check(&self) -> Result<()> {
        let paths = self.paths();
        let current = self.resolve(&paths);

        let mut changes = Vec::new();
        let mut failure = None;
        {
            let mut entries = self.entries.lock();
            for (entry, value) in entries.iter_mut().zip(current) {
                match value {
                    Ok(value) if value != entry.last => {
                        let old = std::mem::replace(&mut entry.last, value.clone());
                        changes.push((entry.path.clone(), value, old, entry.callback.clone()));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }
        }

        for (path, new, old, callback) in changes {
            tracing::trace!(watcher = %self.subscriber_id, %path, "watched path changed");
            if let Err(err) = untrack(|| callback(&new, &old, &path)) {
                match failure {
                    None => failure = Some(err),
                    Some(_) => Runtime::report(err),
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }

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
            self.check()?;

            if self.disposed.load(Ordering::SeqCst) {
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

impl Reactive for WatcherInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn kind(&self) -> SubscriberKind {
        SubscriberKind::Watcher
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

/// Handle to a registered watcher.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    fn register(target: &Container, entries: Vec<WatchEntry>, options: WatchOptions) -> Result<Self> {
        let inner = Arc::new(WatcherInner {
            subscriber_id: SubscriberId::new(),
            target: target.clone(),
            entries: Mutex::new(entries),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        Runtime::register_owned(inner.clone());
        let _registration = RegistrationGuard(inner.subscriber_id);

        let watcher = Self { inner };
        if let Err(err) = watcher.inner.prime(options.immediate) {
            watcher.dispose();
            return Err(err);
        }
        tracing::debug!(watcher = %watcher.inner.subscriber_id, "watcher registered");
        Ok(watcher)
    }

    /// Stop watching. Safe to call more than once.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        Runtime::unregister(self.inner.subscriber_id);
        tracing::debug!(watcher = %self.inner.subscriber_id, "watcher disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// The watched paths, in declaration order.
    pub fn paths(&self) -> Vec<Path> {
        self.inner.paths()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.subscriber_id)
            .field("paths", &self.inner.entries.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn parse_paths<I, S>(paths: I) -> Result<Vec<Path>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .map(|path| Path::parse(path.as_ref()))
        .collect()
}

/// Watch one or more paths with a shared callback.
///
/// ```rust,ignore
/// let watcher = watch(&state, ["count"], |new, old, path| {
///     println!("{path}: {old} -> {new}");
///     Ok(())
/// })?;
/// ```
pub fn watch<I, S, F>(target: &Container, paths: I, callback: F) -> Result<Watcher>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&Value, &Value, &Path) -> Result<()> + 'static,
{
    watch_with(target, paths, WatchOptions::default(), callback)
}

/// Like [`watch`], with options.
pub fn watch_with<I, S, F>(
    target: &Container,
    paths: I,
    options: WatchOptions,
    callback: F,
) -> Result<Watcher>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&Value, &Value, &Path) -> Result<()> + 'static,
{
    let callback: WatchCallback = Arc::new(callback);
    let entries = parse_paths(paths)?
        .into_iter()
        .map(|path| WatchEntry {
            path,
            last: Value::Null,
            callback: callback.clone(),
        })
        .collect();
    Watcher::register(target, entries, options)
}

/// Watch a map of paths, each with its own callback.
pub fn watch_map<I, S>(target: &Container, callbacks: I) -> Result<Watcher>
where
    I: IntoIterator<Item = (S, WatchCallback)>,
    S: AsRef<str>,
{
    let entries = callbacks
        .into_iter()
        .map(|(path, callback)| {
            Ok(WatchEntry {
                path: Path::parse(path.as_ref())?,
                last: Value::Null,
                callback,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Watcher::register(target, entries, WatchOptions::default())
}
