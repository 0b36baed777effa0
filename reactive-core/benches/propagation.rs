//! Benchmark: write propagation through the dependency graph

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reactive_core::reactive::{batch, Computed, Container, Effect};
use serde_json::json;

fn benchmark_fan_out(c: &mut Criterion) {
    let state = Container::from_json(json!({"count": 0})).unwrap();
    let effects: Vec<Effect> = (0..100)
        .map(|_| {
            let state = state.clone();
            Effect::new(move || {
                black_box(state.get("count")?);
                Ok(())
            })
            .unwrap()
        })
        .collect();

    let mut n = 0i64;
    c.bench_function("fan_out_100_effects", |b| {
        b.iter(|| {
            n += 1;
            state.set("count", n).unwrap();
        })
    });

    for effect in effects {
        effect.dispose();
    }
}

fn benchmark_derived_chain(c: &mut Criterion) {
    let state = Container::from_json(json!({"base": 1})).unwrap();
    let mut tail = Computed::new({
        let state = state.clone();
        move || Ok(state.get("base")?.as_i64().unwrap_or(0))
    });
    for _ in 0..50 {
        let prev = tail.clone();
        tail = Computed::new(move || Ok(prev.get()? + 1));
    }

    let mut n = 0i64;
    c.bench_function("derived_chain_50", |b| {
        b.iter(|| {
            n += 1;
            state.set("base", n).unwrap();
            black_box(tail.get().unwrap())
        })
    });
}

fn benchmark_batched_writes(c: &mut Criterion) {
    let state = Container::from_json(json!({"x": 0})).unwrap();
    let effect = Effect::new({
        let state = state.clone();
        move || {
            black_box(state.get("x")?);
            Ok(())
        }
    })
    .unwrap();

    c.bench_function("batch_100_writes", |b| {
        b.iter(|| {
            batch(|| {
                for i in 0..100 {
                    state.set("x", i).unwrap();
                }
            })
        })
    });

    effect.dispose();
}

fn benchmark_lazy_wrap(c: &mut Criterion) {
    let items: Vec<_> = (0..1000).map(|i| json!({"id": i, "tags": ["a", "b"]})).collect();
    let data = json!({ "items": items });

    c.bench_function("wrap_then_read_one", |b| {
        b.iter(|| {
            let state = Container::from_json(data.clone()).unwrap();
            black_box(state.get_path("items.500.id").unwrap())
        })
    });
}

criterion_group!(
    benches,
    benchmark_fan_out,
    benchmark_derived_chain,
    benchmark_batched_writes,
    benchmark_lazy_wrap
);
criterion_main!(benches);
