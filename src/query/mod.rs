//! Metrics queries over the event log
//!
//! Queries scan a snapshot of the log on demand; there is no background
//! recomputation. Every rate is a percentage and an empty denominator
//! yields `0.0`.
//!
//! ## Supported queries
//!
//! - Conversion rate of a goal within an optional experiment/variant scope
//! - Step-to-step funnel conversion rates
//! - Per-variant experiment summary (events, unique users, goal rates)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use conversion_lab::events::EventLog;
//! use conversion_lab::experiment::ExperimentRegistry;
//! use conversion_lab::query::{MetricsQuery, Scope};
//!
//! let query = MetricsQuery::new(Arc::new(EventLog::new()), Arc::new(ExperimentRegistry::new()));
//! assert_eq!(query.conversion_rate("signup", &Scope::experiment("exp-1")), 0.0);
//! ```

pub mod sample_size;

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use sample_size::{required_sample_size, SampleSizeCalculator, Z_ALPHA_95, Z_BETA_80};

use crate::events::{Event, EventLog, FUNNEL_STEP_COMPLETED, GOAL_COMPLETED};
use crate::experiment::ExperimentRegistry;

/// Experiment/variant filter applied to event tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    experiment_id: Option<String>,
    variant_id: Option<String>,
}

impl Scope {
    /// Every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Events tagged with `experiment_id`.
    #[must_use]
    pub fn experiment(experiment_id: impl Into<String>) -> Self {
        Self {
            experiment_id: Some(experiment_id.into()),
            variant_id: None,
        }
    }

    /// Narrow to events tagged with `variant_id`.
    #[must_use]
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Build from optional ids.
    #[must_use]
    pub fn new(experiment_id: Option<&str>, variant_id: Option<&str>) -> Self {
        Self {
            experiment_id: experiment_id.map(str::to_string),
            variant_id: variant_id.map(str::to_string),
        }
    }

    /// Whether `event` falls inside this scope.
    #[must_use]
    pub fn contains(&self, event: &Event) -> bool {
        let matches = |wanted: &Option<String>, actual: Option<&str>| {
            wanted.as_deref().map_or(true, |w| actual == Some(w))
        };
        matches(&self.experiment_id, event.experiment_id())
            && matches(&self.variant_id, event.variant_id())
    }
}

/// Conversion between two adjacent funnel steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConversion {
    /// Earlier step ID
    pub from_step: String,
    /// Later step ID
    pub to_step: String,
    /// Completions of the earlier step
    pub from_count: u64,
    /// Completions of the later step
    pub to_count: u64,
    /// `to_count / from_count * 100`, 0 when `from_count` is 0
    pub rate: f64,
}

impl StepConversion {
    /// Map key of this pair: `"{from_step}_to_{to_step}"`.
    #[must_use]
    pub fn key(&self) -> String {
        step_pair_key(&self.from_step, &self.to_step)
    }
}

/// Map key for a pair of funnel steps.
#[must_use]
pub fn step_pair_key(from_step: &str, to_step: &str) -> String {
    format!("{from_step}_to_{to_step}")
}

/// Funnel conversion rates keyed by step pair, in declared step order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelRates {
    steps: Vec<StepConversion>,
}

impl FunnelRates {
    /// Rate for a step-pair key, if the pair exists.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.steps.iter().find(|s| s.key() == key).map(|s| s.rate)
    }

    /// Rate between two step IDs, if they are adjacent.
    #[must_use]
    pub fn rate(&self, from_step: &str, to_step: &str) -> Option<f64> {
        self.steps
            .iter()
            .find(|s| s.from_step == from_step && s.to_step == to_step)
            .map(|s| s.rate)
    }

    /// Pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = &StepConversion> {
        self.steps.iter()
    }

    /// Number of step pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if there are no step pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Flatten into a key -> rate map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.steps.iter().map(|s| (s.key(), s.rate)).collect()
    }
}

/// Per-variant row of [`MetricsQuery::experiment_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    /// Variant ID
    pub variant_id: String,
    /// Events tagged with the experiment and this variant (derived included)
    pub total_events: u64,
    /// Distinct user IDs among those events
    pub unique_users: usize,
    /// Goal ID -> conversion rate (percent)
    pub conversion_rates: BTreeMap<String, f64>,
}

#[derive(Default)]
struct VariantAccumulator<'a> {
    total: u64,
    users: FxHashSet<&'a str>,
    goals: FxHashMap<&'a str, u64>,
}

/// Read-side aggregation over the event log.
pub struct MetricsQuery {
    log: Arc<EventLog>,
    registry: Arc<ExperimentRegistry>,
}

impl MetricsQuery {
    /// Create a query view over `log`, resolving funnels and experiments in
    /// `registry`.
    #[must_use]
    pub const fn new(log: Arc<EventLog>, registry: Arc<ExperimentRegistry>) -> Self {
        Self { log, registry }
    }

    /// Number of events in scope.
    #[must_use]
    pub fn event_count(&self, scope: &Scope) -> u64 {
        self.log.snapshot().iter().filter(|e| scope.contains(e)).count() as u64
    }

    /// Number of distinct users in scope.
    #[must_use]
    pub fn unique_users(&self, scope: &Scope) -> usize {
        let snapshot = self.log.snapshot();
        snapshot
            .iter()
            .filter(|e| scope.contains(e))
            .map(|e| e.user_id())
            .collect::<FxHashSet<_>>()
            .len()
    }

    /// `goal_completed` events for `goal_id` divided by all events, in scope,
    /// as a percentage.
    #[must_use]
    pub fn conversion_rate(&self, goal_id: &str, scope: &Scope) -> f64 {
        let snapshot = self.log.snapshot();
        let (conversions, total) = snapshot
            .iter()
            .filter(|e| scope.contains(e))
            .fold((0_u64, 0_u64), |(conversions, total), e| {
                (conversions + u64::from(completes_goal(e, goal_id)), total + 1)
            });
        percentage(conversions, total)
    }

    /// Step-to-step conversion for each adjacent pair of `funnel_id`.
    ///
    /// Returns an empty result for an unknown funnel.
    #[must_use]
    pub fn funnel_conversion_rates(&self, funnel_id: &str, scope: &Scope) -> FunnelRates {
        let Some(funnel) = self.registry.funnel(funnel_id) else {
            return FunnelRates::default();
        };

        let snapshot = self.log.snapshot();
        let mut counts: FxHashMap<&str, u64> = FxHashMap::default();
        for event in snapshot.iter().filter(|e| {
            e.name() == FUNNEL_STEP_COMPLETED
                && str_property(e, "funnel_id") == Some(funnel_id)
                && scope.contains(e)
        }) {
            if let Some(step_id) = str_property(event, "step_id") {
                *counts.entry(step_id).or_default() += 1;
            }
        }

        let steps = funnel
            .adjacent_pairs()
            .map(|(from, to)| {
                let from_count = counts.get(from.id()).copied().unwrap_or(0);
                let to_count = counts.get(to.id()).copied().unwrap_or(0);
                StepConversion {
                    from_step: from.id().to_string(),
                    to_step: to.id().to_string(),
                    from_count,
                    to_count,
                    rate: percentage(to_count, from_count),
                }
            })
            .collect();
        FunnelRates { steps }
    }

    /// One summary row per variant observed for `experiment_id`.
    ///
    /// Rows follow the experiment's declared variant order; variants seen in
    /// the log but not declared come last, ordered by ID. Goal rates cover
    /// the experiment's goal IDs, or every observed goal when the
    /// experiment is not registered.
    #[must_use]
    pub fn experiment_metrics(&self, experiment_id: &str) -> Vec<VariantSummary> {
        let snapshot = self.log.snapshot();
        let mut by_variant: FxHashMap<&str, VariantAccumulator<'_>> = FxHashMap::default();

        for event in snapshot
            .iter()
            .filter(|e| e.experiment_id() == Some(experiment_id))
        {
            let Some(variant_id) = event.variant_id() else {
                continue;
            };
            let acc = by_variant.entry(variant_id).or_default();
            acc.total += 1;
            acc.users.insert(event.user_id());
            if event.name() == GOAL_COMPLETED {
                if let Some(goal_id) = str_property(event, "goal_id") {
                    *acc.goals.entry(goal_id).or_default() += 1;
                }
            }
        }

        let experiment = self.registry.get(experiment_id);
        let goal_ids: Vec<String> = experiment.as_ref().map_or_else(
            || {
                let mut observed: Vec<String> = by_variant
                    .values()
                    .flat_map(|acc| acc.goals.keys().map(|g| (*g).to_string()))
                    .collect::<FxHashSet<_>>()
                    .into_iter()
                    .collect();
                observed.sort();
                observed
            },
            |e| e.goals().to_vec(),
        );

        let mut order: Vec<&str> = experiment
            .as_ref()
            .map(|e| e.variants().iter().map(|v| v.id()).collect())
            .unwrap_or_default();
        order.retain(|id| by_variant.contains_key(id));
        let mut undeclared: Vec<&str> = by_variant
            .keys()
            .copied()
            .filter(|id| !order.contains(id))
            .collect();
        undeclared.sort_unstable();
        order.extend(undeclared);

        order
            .into_iter()
            .filter_map(|variant_id| {
                let acc = by_variant.get(variant_id)?;
                let conversion_rates = goal_ids
                    .iter()
                    .map(|goal_id| {
                        let conversions = acc.goals.get(goal_id.as_str()).copied().unwrap_or(0);
                        (goal_id.clone(), percentage(conversions, acc.total))
                    })
                    .collect();
                Some(VariantSummary {
                    variant_id: variant_id.to_string(),
                    total_events: acc.total,
                    unique_users: acc.users.len(),
                    conversion_rates,
                })
            })
            .collect()
    }
}

fn completes_goal(event: &Event, goal_id: &str) -> bool {
    event.name() == GOAL_COMPLETED && str_property(event, "goal_id") == Some(goal_id)
}

fn str_property<'a>(event: &'a Event, key: &str) -> Option<&'a str> {
    event.property(key).and_then(Value::as_str)
}

/// `numerator / denominator * 100`, or 0 when the denominator is 0.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Experiment, Funnel, FunnelStep, Variant};

    fn tagged(name: &str, user: &str, variant: &str) -> Event {
        Event::builder(name, user, "s")
            .experiment_id(Some("exp".into()))
            .variant_id(Some(variant.into()))
            .build()
    }

    fn goal_completed(user: &str, variant: &str, goal_id: &str) -> Event {
        Event::builder(GOAL_COMPLETED, user, "s")
            .experiment_id(Some("exp".into()))
            .variant_id(Some(variant.into()))
            .property("goal_id", goal_id)
            .build()
    }

    fn step(user: &str, funnel_id: &str, step_id: &str) -> Event {
        Event::builder(FUNNEL_STEP_COMPLETED, user, "s")
            .property("funnel_id", funnel_id)
            .property("step_id", step_id)
            .build()
    }

    #[test]
    fn test_percentage() {
        assert!((percentage(1, 4) - 25.0).abs() < f64::EPSILON);
        assert!(percentage(5, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scope_contains() {
        let event = tagged("x", "u", "a");
        assert!(Scope::all().contains(&event));
        assert!(Scope::experiment("exp").contains(&event));
        assert!(Scope::experiment("exp").with_variant("a").contains(&event));
        assert!(!Scope::experiment("exp").with_variant("b").contains(&event));
        assert!(!Scope::experiment("other").contains(&event));
        assert!(!Scope::experiment("exp").contains(&Event::builder("x", "u", "s").build()));
        assert!(Scope::new(None, Some("a")).contains(&event));
    }

    #[test]
    fn test_conversion_rate_empty_log() {
        let query = MetricsQuery::new(Arc::new(EventLog::new()), Arc::new(ExperimentRegistry::new()));
        assert!(query.conversion_rate("signup", &Scope::all()).abs() < f64::EPSILON);
        assert!(query
            .funnel_conversion_rates("missing", &Scope::all())
            .is_empty());
        assert!(query.experiment_metrics("exp").is_empty());
    }

    #[test]
    fn test_conversion_rate_scoped() {
        let log = Arc::new(EventLog::new());
        for i in 0..3 {
            log.append(tagged("page_view", &format!("a{i}"), "a"));
        }
        log.append(goal_completed("a0", "a", "signup"));
        log.append(tagged("page_view", "b0", "b"));

        let query = MetricsQuery::new(Arc::clone(&log), Arc::new(ExperimentRegistry::new()));
        let scope_a = Scope::experiment("exp").with_variant("a");
        assert!((query.conversion_rate("signup", &scope_a) - 25.0).abs() < 1e-9);
        assert!((query.conversion_rate("signup", &Scope::all()) - 20.0).abs() < 1e-9);
        assert_eq!(query.event_count(&scope_a), 4);
        assert_eq!(query.unique_users(&scope_a), 3);
    }

    #[test]
    fn test_funnel_rates() {
        let registry = Arc::new(ExperimentRegistry::new());
        registry
            .register_funnel(Funnel::new(
                "checkout",
                "Checkout",
                vec![
                    FunnelStep::new("cart", "cart_viewed", 1),
                    FunnelStep::new("pay", "payment_started", 2),
                    FunnelStep::new("done", "order_placed", 3),
                ],
            ))
            .unwrap();

        let log = Arc::new(EventLog::new());
        for i in 0..10 {
            log.append(step(&format!("u{i}"), "checkout", "cart"));
        }
        for i in 0..4 {
            log.append(step(&format!("u{i}"), "checkout", "pay"));
        }
        log.append(step("other", "elsewhere", "pay"));

        let rates = MetricsQuery::new(log, registry).funnel_conversion_rates("checkout", &Scope::all());
        assert_eq!(rates.len(), 2);
        assert_eq!(rates.get("cart_to_pay"), Some(40.0));
        assert_eq!(rates.rate("pay", "done"), Some(0.0));
        let keys: Vec<String> = rates.to_map().into_keys().collect();
        assert_eq!(keys, vec!["cart_to_pay", "pay_to_done"]);
    }

    #[test]
    fn test_experiment_metrics_rows() {
        let registry = Arc::new(ExperimentRegistry::new());
        registry
            .create(
                Experiment::builder("exp", "Test")
                    .variant(Variant::new("control", 50.0))
                    .variant(Variant::new("treatment", 50.0))
                    .goal("signup")
                    .build(),
            )
            .unwrap();

        let log = Arc::new(EventLog::new());
        log.append(tagged("page_view", "u1", "treatment"));
        log.append(tagged("page_view", "u2", "treatment"));
        log.append(tagged("page_view", "u2", "treatment"));
        log.append(goal_completed("u2", "treatment", "signup"));
        log.append(tagged("page_view", "u3", "control"));
        log.append(tagged("page_view", "u4", "rogue"));
        log.append(Event::builder("page_view", "u5", "s").build());

        let rows = MetricsQuery::new(log, registry).experiment_metrics("exp");
        let ids: Vec<&str> = rows.iter().map(|r| r.variant_id.as_str()).collect();
        assert_eq!(ids, vec!["control", "treatment", "rogue"]);

        let treatment = &rows[1];
        assert_eq!(treatment.total_events, 4);
        assert_eq!(treatment.unique_users, 2);
        assert_eq!(treatment.conversion_rates.get("signup"), Some(&25.0));
        assert_eq!(rows[0].conversion_rates.get("signup"), Some(&0.0));
    }
}
