//! Benchmarks for chaining and aggregation over the built-in knowledge pack.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fixwise::category::Category;
use fixwise::classify::KeywordClassifier;
use fixwise::config::EngineConfig;
use fixwise::engine::Engine;
use fixwise::knowledge::KnowledgePack;

const ANSWERS: [(&str, &str); 6] = [
    ("device", "computer"),
    ("high_cpu_usage", "yes"),
    ("fan_noise", "yes"),
    ("device_hot", "yes"),
    ("ram_percent", "91"),
    ("wifi_drops", "yes"),
];

fn engine() -> Engine {
    Engine::from_pack(KnowledgePack::builtin(), EngineConfig::default())
        .unwrap()
        .with_classifier(Arc::new(KeywordClassifier::new()))
}

fn bench_load_pack(c: &mut Criterion) {
    c.bench_function("load_builtin_pack", |bench| {
        bench.iter(|| black_box(KnowledgePack::builtin().into_rule_base().unwrap()))
    });
}

fn bench_forward(c: &mut Criterion) {
    let engine = engine();
    c.bench_function("forward_chain_builtin", |bench| {
        bench.iter(|| {
            let mut session = engine.session();
            session.assert_facts(ANSWERS).unwrap();
            black_box(session.forward_chain().unwrap())
        })
    });
}

fn bench_backward(c: &mut Criterion) {
    let engine = engine();
    c.bench_function("needed_facts_all_empty", |bench| {
        bench.iter(|| {
            let mut session = engine.session();
            black_box(session.needed_facts_all().unwrap())
        })
    });
    c.bench_function("needed_facts_overheating", |bench| {
        bench.iter(|| {
            let mut session = engine.session();
            session.assert_fact("device", "computer").unwrap();
            black_box(session.needed_facts(Category::Overheating).unwrap())
        })
    });
}

fn bench_diagnose(c: &mut Criterion) {
    let engine = engine();
    c.bench_function("diagnose_with_text", |bench| {
        bench.iter(|| {
            let mut session = engine.session();
            session.assert_facts(ANSWERS).unwrap();
            black_box(
                session
                    .diagnose(Some("laptop is hot and slow and the wifi drops"))
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_load_pack,
    bench_forward,
    bench_backward,
    bench_diagnose
);
criterion_main!(benches);
