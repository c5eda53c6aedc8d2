//! Policy evaluation latency
//!
//! Run with: cargo bench -p triage-policy

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use triage_policy::{PolicyConfig, PolicyEngine};

fn benchmark_policy_evaluation(c: &mut Criterion) {
    let engine = PolicyEngine::new(&PolicyConfig::default()).expect("default policy compiles");

    let cases = vec![
        ("confident", "Water", 0.92, "No water in the washroom of coach B2"),
        ("fallback_emergency", "Coach", 0.41, "There is a medical emergency in coach B3"),
        ("fallback_default", "Catering", 0.22, "Which platform does the Rajdhani leave from?"),
        (
            "fallback_long",
            "General",
            0.35,
            "The coach has not been cleaned since the journey started and the toilets are \
             overflowing, several passengers have complained to the attendant without result",
        ),
    ];

    let mut group = c.benchmark_group("PolicyEngine_evaluate");
    for (name, label, confidence, text) in cases {
        group.bench_with_input(BenchmarkId::new("evaluate", name), &text, |b, text| {
            b.iter(|| engine.evaluate(black_box(label), black_box(confidence), black_box(text)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_policy_evaluation);
criterion_main!(benches);
