//! Assignment benchmarks
//!
//! - Raw FNV-1a bucket computation
//! - First assignment (hash + insert-if-absent)
//! - Repeat assignment (cache hit)

use std::sync::Arc;

use conversion_lab::assignment::hash::bucket;
use conversion_lab::assignment::VariantAssigner;
use conversion_lab::experiment::{Experiment, ExperimentRegistry, ExperimentStatus, Variant};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};

fn user_ids(count: usize) -> Vec<String> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(16).map(char::from).collect())
        .collect()
}

fn running_registry(variants: usize) -> Arc<ExperimentRegistry> {
    #[allow(clippy::cast_precision_loss)]
    let weight = 100.0 / variants as f64;
    let registry = Arc::new(ExperimentRegistry::new());
    registry
        .create(
            Experiment::builder("bench", "Bench")
                .variants((0..variants).map(|i| Variant::new(format!("v{i}"), weight)).collect())
                .build(),
        )
        .unwrap();
    registry.set_status("bench", ExperimentStatus::Running).unwrap();
    registry
}

fn bench_bucket(c: &mut Criterion) {
    let users = user_ids(1_000);
    c.bench_function("bucket_1k_users", |b| {
        b.iter(|| {
            for user in &users {
                black_box(bucket(black_box(user), "checkout-redesign"));
            }
        });
    });
}

fn bench_first_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_assignment");
    let users = user_ids(10_000);

    for variants in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(variants), &variants, |b, &variants| {
            b.iter_batched(
                || VariantAssigner::new(running_registry(variants)),
                |assigner| {
                    for user in &users {
                        black_box(assigner.assign(user, "bench"));
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_cached_assignment(c: &mut Criterion) {
    let users = user_ids(10_000);
    let assigner = VariantAssigner::new(running_registry(2));
    for user in &users {
        let _ = assigner.assign(user, "bench");
    }

    c.bench_function("cached_assignment_10k", |b| {
        b.iter(|| {
            for user in &users {
                black_box(assigner.assign(user, "bench"));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_bucket,
    bench_first_assignment,
    bench_cached_assignment
);
criterion_main!(benches);
