//! Benchmarks for synthesis and determinization

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use supra_automata::subset::subset_construction;
use supra_synthesis::synchronized_composition;
use supra_test::{generate, GeneratorConfig};

fn bench_synchronized_composition(c: &mut Criterion) {
    let small = generate(&GeneratorConfig::light());
    let medium = generate(&GeneratorConfig::default());

    c.bench_function("synchronized_composition_small", |b| {
        b.iter(|| black_box(synchronized_composition(black_box(&small))))
    });
    c.bench_function("synchronized_composition_medium", |b| {
        b.iter(|| black_box(synchronized_composition(black_box(&medium))))
    });
}

fn bench_subset_construction(c: &mut Criterion) {
    let aut = generate(&GeneratorConfig::heavy());

    c.bench_function("subset_construction", |b| {
        b.iter(|| black_box(subset_construction(black_box(&aut), 1)))
    });
}

fn bench_algebra(c: &mut Criterion) {
    // Self-products keep the event sets compatible.
    let a = generate(&GeneratorConfig::default());

    c.bench_function("intersection", |b| {
        b.iter(|| black_box(a.intersection(black_box(&a))))
    });
    c.bench_function("accessible", |b| b.iter(|| black_box(a.accessible())));
}

criterion_group!(
    benches,
    bench_synchronized_composition,
    bench_subset_construction,
    bench_algebra
);
criterion_main!(benches);
