use criterion::{criterion_group, criterion_main, Criterion};
use delve::{generate, CorridorStyle, GenerationConfig};
use std::hint::black_box;

pub fn generation_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    group.bench_function("testing", |b| {
        let config = GenerationConfig::for_testing(42);
        b.iter(|| generate(black_box(&config)).unwrap())
    });

    group.bench_function("default", |b| {
        let config = GenerationConfig::new(42);
        b.iter(|| generate(black_box(&config)).unwrap())
    });

    // Organic corridors and repair walks dominate on large maps.
    group.bench_function("detailed organic", |b| {
        let config = GenerationConfig {
            corridor_style: CorridorStyle::Organic,
            ..GenerationConfig::for_detailed_generation(42)
        };
        b.iter(|| generate(black_box(&config)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, generation_bench);
criterion_main!(benches);
