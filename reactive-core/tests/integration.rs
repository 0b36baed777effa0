//! Integration Tests for the Reactive Engine
//!
//! These tests verify that containers, derived values, effects, watchers and
//! batches work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use reactive_core::reactive::{
    batch, untrack, watch, Computed, Container, Effect, ReactiveContext, Runtime, SubscriberId,
    Value,
};
use reactive_core::ReactiveError;

fn int(value: Value) -> i64 {
    value.as_i64().unwrap_or_default()
}

/// A derived property feeds an effect, which fires once per change.
#[test]
fn derived_property_drives_effect() {
    let state = Container::from_json(json!({"count": 0})).unwrap();
    state
        .define_derived("doubled", |s| Ok(Value::from(int(s.get("count")?) * 2)))
        .unwrap();

    let logged = Arc::new(Mutex::new(Vec::new()));
    let effect = Effect::new({
        let state = state.clone();
        let logged = logged.clone();
        move || {
            logged.lock().push(int(state.get("doubled")?));
            Ok(())
        }
    })
    .unwrap();

    state.set("count", 5).unwrap();

    assert_eq!(int(state.get("doubled").unwrap()), 10);
    assert_eq!(*logged.lock(), vec![0, 10]);
    assert_eq!(effect.run_count(), 2);
}

/// Writing a derived property is refused and changes nothing.
#[test]
fn derived_property_is_read_only() {
    let state = Container::from_json(json!({"count": 2})).unwrap();
    state
        .define_derived("doubled", |s| Ok(Value::from(int(s.get("count")?) * 2)))
        .unwrap();

    assert_eq!(
        state.set("doubled", 1).unwrap_err(),
        ReactiveError::ReadOnlyDerived {
            name: "doubled".into()
        }
    );
    assert_eq!(int(state.get("doubled").unwrap()), 4);
}

/// Derived properties that read each other fail instead of recursing.
#[test]
fn derived_properties_detect_mutual_cycle() {
    let state = Container::from_json(json!({"seed": 1})).unwrap();
    state.define_derived("a", |s| s.get("b")).unwrap();
    state.define_derived("b", |s| s.get("a")).unwrap();

    assert_eq!(
        state.get("a").unwrap_err(),
        ReactiveError::DerivedCycle { name: "a".into() }
    );
    assert_eq!(
        state.get("b").unwrap_err(),
        ReactiveError::DerivedCycle { name: "b".into() }
    );

    // The rest of the container is unaffected.
    assert_eq!(int(state.get("seed").unwrap()), 1);
}

/// A watcher fires only for the write that changed the value.
#[test]
fn watcher_ignores_equal_writes() {
    let state = Container::from_json(json!({"count": 0})).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let _watcher = watch(&state, ["count"], {
        let calls = calls.clone();
        move |new, old, _path| {
            calls.lock().push((new.clone(), old.clone()));
            Ok(())
        }
    })
    .unwrap();

    state.set("count", 1).unwrap();
    state.set("count", 1).unwrap();

    assert_eq!(*calls.lock(), vec![(Value::Int(1), Value::Int(0))]);
}

/// Nested writes and whole-object replacement each fire the effect once.
#[test]
fn nested_container_replacement() {
    let state = Container::from_json(json!({"user": {"name": "A"}})).unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));
    let effect = Effect::new({
        let state = state.clone();
        let names = names.clone();
        move || {
            let name = state.get_path("user.name")?;
            names.lock().push(name.as_str().unwrap_or_default().to_owned());
            Ok(())
        }
    })
    .unwrap();

    let old_user = state.get("user").unwrap();
    state.set_path("user.name", "B").unwrap();
    assert_eq!(effect.run_count(), 2);

    state.set("user", json!({"name": "B"})).unwrap();
    assert_eq!(effect.run_count(), 3);
    assert_eq!(*names.lock(), vec!["A", "B", "B"]);

    // The detached child no longer drives the effect.
    let old_user = old_user.as_container().cloned().unwrap();
    old_user.set("name", "stale").unwrap();
    assert_eq!(effect.run_count(), 3);
}

/// Reading the same child twice returns the same container.
#[test]
fn child_identity_is_stable() {
    let state = Container::from_json(json!({"user": {"name": "A"}})).unwrap();
    let first = state.get("user").unwrap();
    let second = state.get("user").unwrap();
    assert_eq!(first, second);
}

/// Three writes in a batch produce one run that sees the last value.
#[test]
fn batch_coalesces_writes() {
    let state = Container::from_json(json!({"x": 0})).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _effect = Effect::new({
        let state = state.clone();
        let seen = seen.clone();
        move || {
            seen.lock().push(int(state.get("x")?));
            Ok(())
        }
    })
    .unwrap();

    batch(|| {
        state.set("x", 1).unwrap();
        state.set("x", 2).unwrap();
        state.set("x", 3).unwrap();
    });

    assert_eq!(*seen.lock(), vec![0, 3]);
}

/// Derived values read inside a batch-triggered effect are already fresh.
#[test]
fn effect_sees_fresh_derived_after_batch() {
    let state = Container::from_json(json!({"a": 1, "b": 2})).unwrap();
    let sum = Computed::new({
        let state = state.clone();
        move || Ok(int(state.get("a")?) + int(state.get("b")?))
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let effect = Effect::new({
        let sum = sum.clone();
        let seen = seen.clone();
        move || {
            seen.lock().push(sum.get()?);
            Ok(())
        }
    })
    .unwrap();

    batch(|| {
        state.set("a", 10).unwrap();
        state.set("b", 20).unwrap();
    });

    assert_eq!(*seen.lock(), vec![3, 30]);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(sum.computations(), 2);
}

/// A disposed effect never runs again.
#[test]
fn disposed_effect_does_not_run() {
    let state = Container::from_json(json!({"x": 0})).unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let effect = Effect::new({
        let state = state.clone();
        let run_count = run_count.clone();
        move || {
            state.get("x")?;
            run_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .unwrap();

    // Ran once on creation
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    effect.dispose();
    state.set("x", 1).unwrap();
    state.set("x", 2).unwrap();

    assert_eq!(run_count.load(Ordering::SeqCst), 1);
}

/// Dependencies are re-collected on each run, so an abandoned branch stops
/// triggering the effect.
#[test]
fn dynamic_dependencies_follow_branches() {
    let state = Container::from_json(json!({"flag": true, "a": 1, "b": 2})).unwrap();
    let effect = Effect::new({
        let state = state.clone();
        move || {
            if state.get("flag")?.as_bool().unwrap_or(false) {
                state.get("a")?;
            } else {
                state.get("b")?;
            }
            Ok(())
        }
    })
    .unwrap();

    state.set("b", 3).unwrap();
    assert_eq!(effect.run_count(), 1);

    state.set("flag", false).unwrap();
    assert_eq!(effect.run_count(), 2);

    state.set("a", 5).unwrap();
    assert_eq!(effect.run_count(), 2);

    state.set("b", 4).unwrap();
    assert_eq!(effect.run_count(), 3);
}

/// Structural list operations notify subscribers of the list's shape.
#[test]
fn list_shape_changes_notify() {
    let state = Container::from_json(json!({"items": [1, 2]})).unwrap();
    let lengths = Arc::new(Mutex::new(Vec::new()));
    let _effect = Effect::new({
        let state = state.clone();
        let lengths = lengths.clone();
        move || {
            let items = state.get("items")?;
            let len = items.as_container().map_or(0, Container::len);
            lengths.lock().push(len);
            Ok(())
        }
    })
    .unwrap();

    let items = state.get("items").unwrap().as_container().cloned().unwrap();
    items.push(3).unwrap();
    items.pop().unwrap();
    items.insert(0, 0).unwrap();
    items.clear().unwrap();

    assert_eq!(*lengths.lock(), vec![2, 3, 2, 3, 0]);
}

/// An effect that snapshots the whole tree re-runs on any nested change.
#[test]
fn snapshot_effect_tracks_everything() {
    let state = Container::from_json(json!({"todos": [{"done": false}]})).unwrap();
    let saved = Arc::new(Mutex::new(Vec::new()));
    let _effect = Effect::new({
        let state = state.clone();
        let saved = saved.clone();
        move || {
            saved.lock().push(state.to_json());
            Ok(())
        }
    })
    .unwrap();

    state.set_path("todos.0.done", true).unwrap();
    state.set("filter", "all").unwrap();

    let saved = saved.lock();
    assert_eq!(saved.len(), 3);
    assert_eq!(
        saved[2],
        json!({"todos": [{"done": true}], "filter": "all"})
    );
}

/// Reads inside `untrack` register nothing.
#[test]
fn untracked_reads_do_not_subscribe() {
    let state = Container::from_json(json!({"x": 0, "y": 0})).unwrap();
    let effect = Effect::new({
        let state = state.clone();
        move || {
            state.get("x")?;
            untrack(|| state.get("y"))?;
            Ok(())
        }
    })
    .unwrap();

    assert_eq!(effect.dependency_count(), 1);
    state.set("y", 1).unwrap();
    assert_eq!(effect.run_count(), 1);
}

/// Errors from scheduled re-runs are collected rather than lost.
#[test]
fn rerun_errors_are_collected() {
    let state = Container::from_json(json!({"x": 0})).unwrap();
    let _effect = Effect::new({
        let state = state.clone();
        move || match int(state.get("x")?) {
            n if n < 0 => Err(ReactiveError::callback("negative")),
            _ => Ok(()),
        }
    })
    .unwrap();

    state.set("x", -1).unwrap();
    assert_eq!(
        Runtime::take_errors(),
        vec![ReactiveError::callback("negative")]
    );
}

/// ReactiveContext scopes nest and unwind in order.
#[test]
fn nested_reactive_contexts() {
    let outer_id = SubscriberId::new();
    let inner_id = SubscriberId::new();

    let _outer_ctx = ReactiveContext::enter(outer_id);
    assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));

    {
        let _inner_ctx = ReactiveContext::enter(inner_id);
        assert_eq!(ReactiveContext::current_subscriber(), Some(inner_id));

        let _untracked = ReactiveContext::untracked();
        assert!(!ReactiveContext::is_active());
    }

    assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
}

/// Each thread runs an independent engine.
#[test]
fn threads_have_independent_runtimes() {
    let handle = std::thread::spawn(|| {
        let state = Container::from_json(json!({"x": 0})).unwrap();
        let effect = Effect::new({
            let state = state.clone();
            move || state.get("x").map(|_| ())
        })
        .unwrap();
        state.set("x", 1).unwrap();
        effect.run_count()
    });

    assert_eq!(handle.join().unwrap(), 2);
    assert_eq!(Runtime::pending(), 0);
}
