//! Deterministic variant assignment
//!
//! A user is bucketed into a variant of a running experiment by hashing
//! `user_id || experiment_id` (see [`hash`]) and walking the variants'
//! cumulative weights. The first result is persisted and returned on every
//! later call, so a user keeps their treatment across sessions and across
//! pause/resume of the experiment.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use conversion_lab::assignment::VariantAssigner;
//! use conversion_lab::experiment::{Experiment, ExperimentRegistry, ExperimentStatus, Variant};
//!
//! let registry = Arc::new(ExperimentRegistry::new());
//! registry.create(
//!     Experiment::builder("exp-1", "Checkout button")
//!         .variant(Variant::new("control", 50.0))
//!         .variant(Variant::new("green", 50.0))
//!         .build(),
//! )?;
//! let assigner = VariantAssigner::new(Arc::clone(&registry));
//!
//! // Draft experiments do not assign
//! assert_eq!(assigner.assign("user-42", "exp-1"), None);
//!
//! registry.set_status("exp-1", ExperimentStatus::Running)?;
//! let variant = assigner.assign("user-42", "exp-1").unwrap();
//! assert_eq!(assigner.assign("user-42", "exp-1"), Some(variant));
//! # Ok::<(), conversion_lab::Error>(())
//! ```

pub mod hash;
mod store;

use std::sync::Arc;

use tracing::debug;

pub use store::{AssignmentStore, MemoryAssignmentStore};

use crate::experiment::{ExperimentRegistry, ExperimentStatus, Variant};
use crate::Properties;

/// Buckets users into experiment variants.
pub struct VariantAssigner<S = MemoryAssignmentStore> {
    registry: Arc<ExperimentRegistry>,
    store: S,
}

impl VariantAssigner<MemoryAssignmentStore> {
    /// Create an assigner backed by an in-memory store.
    #[must_use]
    pub fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self::with_store(registry, MemoryAssignmentStore::new())
    }
}

impl<S: AssignmentStore> VariantAssigner<S> {
    /// Create an assigner over a custom assignment store.
    #[must_use]
    pub const fn with_store(registry: Arc<ExperimentRegistry>, store: S) -> Self {
        Self { registry, store }
    }

    /// Get the backing assignment store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Assign `user_id` to a variant of `experiment_id`.
    ///
    /// Returns `None` if the experiment is unknown or not running. An
    /// existing assignment is returned as-is; otherwise the variant is
    /// computed from the stable hash and stored before returning.
    #[must_use]
    pub fn assign(&self, user_id: &str, experiment_id: &str) -> Option<String> {
        let experiment = self.registry.get(experiment_id)?;
        if experiment.status() != ExperimentStatus::Running {
            debug!(user_id, experiment_id, status = %experiment.status(), "experiment not running");
            return None;
        }

        if let Some(existing) = self.store.get(user_id, experiment_id) {
            return Some(existing);
        }

        let variant_id = self.store.get_or_insert_with(user_id, experiment_id, || {
            let h = hash::bucket(user_id, experiment_id);
            let variant = pick(h, experiment.variants());
            debug!(user_id, experiment_id, bucket = h, variant = %variant, "assigned variant");
            variant
        });
        Some(variant_id)
    }

    /// Get an existing assignment without bucketing.
    ///
    /// Works regardless of experiment status.
    #[must_use]
    pub fn assignment(&self, user_id: &str, experiment_id: &str) -> Option<String> {
        self.store.get(user_id, experiment_id)
    }

    /// Assign and return the chosen variant's configuration map.
    #[must_use]
    pub fn variant_config(&self, user_id: &str, experiment_id: &str) -> Option<Properties> {
        let variant_id = self.assign(user_id, experiment_id)?;
        let experiment = self.registry.get(experiment_id)?;
        experiment.variant(&variant_id).map(|v| v.config().clone())
    }

    /// All `(experiment_id, variant_id)` assignments held by a user.
    #[must_use]
    pub fn assignments_for_user(&self, user_id: &str) -> Vec<(String, String)> {
        self.store.for_user(user_id)
    }

    /// Number of stored assignments.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.store.len()
    }
}

fn pick(h: f64, variants: &[Variant]) -> String {
    let weights: Vec<f64> = variants.iter().map(Variant::weight).collect();
    hash::select_index(h, &weights)
        .and_then(|i| variants.get(i))
        .map(|v| v.id().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Experiment;

    fn setup(weights: &[(&str, f64)]) -> (Arc<ExperimentRegistry>, VariantAssigner) {
        let registry = Arc::new(ExperimentRegistry::new());
        let variants = weights.iter().map(|(id, w)| Variant::new(*id, *w)).collect();
        registry
            .create(Experiment::builder("exp", "Test").variants(variants).build())
            .unwrap();
        registry.set_status("exp", ExperimentStatus::Running).unwrap();
        let assigner = VariantAssigner::new(Arc::clone(&registry));
        (registry, assigner)
    }

    #[test]
    fn test_unknown_experiment() {
        let (_, assigner) = setup(&[("a", 50.0), ("b", 50.0)]);
        assert_eq!(assigner.assign("user", "missing"), None);
        assert_eq!(assigner.assignment_count(), 0);
    }

    #[test]
    fn test_assign_idempotent() {
        let (_, assigner) = setup(&[("a", 50.0), ("b", 50.0)]);
        let first = assigner.assign("user-1", "exp").unwrap();
        for _ in 0..10 {
            assert_eq!(assigner.assign("user-1", "exp").as_ref(), Some(&first));
        }
        assert_eq!(assigner.assignment_count(), 1);
    }

    #[test]
    fn test_assignment_matches_hash() {
        let (_, assigner) = setup(&[("a", 50.0), ("b", 50.0)]);
        for i in 0..200 {
            let user = format!("user-{i}");
            let expected = if hash::bucket(&user, "exp") <= 0.5 { "a" } else { "b" };
            assert_eq!(assigner.assign(&user, "exp").as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_assignment_survives_pause() {
        let (registry, assigner) = setup(&[("a", 50.0), ("b", 50.0)]);
        let variant = assigner.assign("user-1", "exp").unwrap();

        registry.set_status("exp", ExperimentStatus::Paused).unwrap();
        assert_eq!(assigner.assign("user-1", "exp"), None);
        assert_eq!(assigner.assignment("user-1", "exp"), Some(variant.clone()));

        registry.set_status("exp", ExperimentStatus::Running).unwrap();
        assert_eq!(assigner.assign("user-1", "exp"), Some(variant));
    }

    #[test]
    fn test_full_weight_variant() {
        let (_, assigner) = setup(&[("tiny", 0.01), ("rest", 99.99)]);
        let rest = (0..500)
            .filter(|i| assigner.assign(&format!("u{i}"), "exp").as_deref() == Some("rest"))
            .count();
        assert!(rest >= 495);
    }

    #[test]
    fn test_variant_config() {
        let registry = Arc::new(ExperimentRegistry::new());
        let mut config = Properties::new();
        config.insert("color".into(), "green".into());
        registry
            .create(
                Experiment::builder("exp", "Test")
                    .variant(Variant::new("only-green", 50.0).with_config(config.clone()))
                    .variant(Variant::new("also-green", 50.0).with_config(config))
                    .build(),
            )
            .unwrap();
        registry.set_status("exp", ExperimentStatus::Running).unwrap();
        let assigner = VariantAssigner::new(registry);

        let config = assigner.variant_config("user-1", "exp").unwrap();
        assert_eq!(config["color"], "green");
        assert_eq!(assigner.assignments_for_user("user-1").len(), 1);
    }
}
