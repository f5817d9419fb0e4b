//! Metrics benchmarks
//!
//! Conversion queries scan the whole event log; measure them at increasing
//! log sizes.

use conversion_lab::config::EngineConfig;
use conversion_lab::events::{DeliveryMode, TrackRequest};
use conversion_lab::experiment::{ConversionGoal, Experiment, ExperimentStatus, Funnel, FunnelStep, Variant};
use conversion_lab::ExperimentEngine;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};

/// Engine with one running experiment, one goal, one funnel and
/// roughly `users * 2` tracked source events.
fn populated_engine(users: usize) -> ExperimentEngine {
    let config = EngineConfig {
        delivery: DeliveryMode::Inline,
        ..EngineConfig::default()
    };
    let engine = ExperimentEngine::from_config(config).unwrap();
    let registry = engine.registry();
    registry
        .register_goal(ConversionGoal::new("signup", "signup_completed"))
        .unwrap();
    registry
        .register_funnel(Funnel::new(
            "onboarding",
            "Onboarding",
            vec![
                FunnelStep::new("landing", "page_view", 1),
                FunnelStep::new("signup", "signup_completed", 2),
            ],
        ))
        .unwrap();
    registry
        .create(
            Experiment::builder("hero", "Hero")
                .variant(Variant::new("control", 50.0))
                .variant(Variant::new("urgent", 50.0))
                .goal("signup")
                .build(),
        )
        .unwrap();
    registry.set_status("hero", ExperimentStatus::Running).unwrap();

    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for i in 0..users {
        let user = format!("user-{i}");
        let Some(variant) = engine.assign(&user, "hero") else {
            continue;
        };
        for name in ["page_view", "signup_completed"] {
            if name == "signup_completed" && rng.gen_bool(0.7) {
                continue;
            }
            engine.track_request(
                TrackRequest::new(name)
                    .user_id(user.clone())
                    .experiment("hero")
                    .variant(variant.clone()),
            );
        }
    }
    engine
}

fn bench_conversion_rate(c: &mut Criterion) {
    let mut group = c.benchmark_group("conversion_rate");

    for users in [1_000, 10_000, 50_000] {
        let engine = populated_engine(users);
        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, _| {
            b.iter(|| black_box(engine.conversion_rate("signup", Some("hero"), Some("control"))));
        });
    }

    group.finish();
}

fn bench_funnel_rates(c: &mut Criterion) {
    let mut group = c.benchmark_group("funnel_conversion_rates");

    for users in [1_000, 10_000, 50_000] {
        let engine = populated_engine(users);
        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, _| {
            b.iter(|| black_box(engine.funnel_conversion_rates("onboarding", Some("hero"), None)));
        });
    }

    group.finish();
}

fn bench_experiment_metrics(c: &mut Criterion) {
    let engine = populated_engine(10_000);
    c.bench_function("experiment_metrics_10k", |b| {
        b.iter(|| black_box(engine.experiment_metrics("hero")));
    });
}

criterion_group!(
    benches,
    bench_conversion_rate,
    bench_funnel_rates,
    bench_experiment_metrics
);
criterion_main!(benches);
