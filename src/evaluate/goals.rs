//! Conversion goal evaluation

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::events::{Event, GOAL_COMPLETED};
use crate::experiment::{ConversionGoal, ExperimentRegistry, GoalValue};

/// Matches events against registered conversion goals.
pub struct GoalEvaluator {
    registry: Arc<ExperimentRegistry>,
}

impl GoalEvaluator {
    /// Create an evaluator reading goals from `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self { registry }
    }

    /// Derived `goal_completed` events for every goal `event` satisfies.
    ///
    /// Derived events are never evaluated again; passing one in yields
    /// nothing.
    #[must_use]
    pub fn evaluate(&self, event: &Event) -> Vec<Event> {
        if event.is_derived() {
            return Vec::new();
        }

        self.registry
            .goals_for_event(event.name())
            .iter()
            .filter(|goal| filters_match(goal, event))
            .map(|goal| {
                debug!(goal_id = goal.id(), user_id = event.user_id(), "goal completed");
                completion(goal, event)
            })
            .collect()
    }
}

/// Every filter key must be present on the event with an equal JSON value.
///
/// `experiment`/`experiment_id` and `variant`/`variant_id` fall back to the
/// event's tags when the property bag does not carry them. A type mismatch
/// is simply unequal.
#[must_use]
pub fn filters_match(goal: &ConversionGoal, event: &Event) -> bool {
    goal.filters().iter().all(|(key, expected)| {
        match event.property(key) {
            Some(actual) => actual == expected,
            None => tag(event, key).is_some_and(|tag| expected.as_str() == Some(tag)),
        }
    })
}

fn tag<'a>(event: &'a Event, key: &str) -> Option<&'a str> {
    match key {
        "experiment" | "experiment_id" => event.experiment_id(),
        "variant" | "variant_id" => event.variant_id(),
        _ => None,
    }
}

fn completion(goal: &ConversionGoal, source: &Event) -> Event {
    Event::builder(GOAL_COMPLETED, source.user_id(), source.session_id())
        .experiment_id(source.experiment_id().map(str::to_string))
        .variant_id(source.variant_id().map(str::to_string))
        .property("goal_id", goal.id())
        .property("goal_name", goal.name())
        .property("goal_value_type", goal.value_type().as_str())
        .property("source_event", source.name())
        .value(goal_value(goal.value_type(), source))
        .timestamp(source.timestamp())
        .build()
}

fn goal_value(value_type: GoalValue, source: &Event) -> Option<f64> {
    match value_type {
        GoalValue::Binary | GoalValue::Count => Some(1.0),
        GoalValue::Revenue => source.value().or_else(|| {
            ["revenue", "value"]
                .iter()
                .find_map(|key| source.property(key).and_then(Value::as_f64))
        }),
    }
}
