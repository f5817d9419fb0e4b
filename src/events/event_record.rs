//! Event record - one immutable entry of the event log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Properties;

/// Name of the derived event emitted when a conversion goal matches.
pub const GOAL_COMPLETED: &str = "goal_completed";

/// Name of the derived event emitted when a funnel step matches.
pub const FUNNEL_STEP_COMPLETED: &str = "funnel_step_completed";

/// A tracked event.
///
/// Events are built once and never mutated; the log only appends.
/// `experiment_id` / `variant_id` tags scope the event for metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    id: Uuid,
    name: String,
    user_id: String,
    session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    experiment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variant_id: Option<String>,
    #[serde(default)]
    properties: Properties,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl Event {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> EventBuilder {
        EventBuilder::new(name, user_id, session_id)
    }

    /// Get the unique event ID.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Get the event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the (possibly anonymous) user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the experiment tag, if any.
    #[must_use]
    pub fn experiment_id(&self) -> Option<&str> {
        self.experiment_id.as_deref()
    }

    /// Get the variant tag, if any.
    #[must_use]
    pub fn variant_id(&self) -> Option<&str> {
        self.variant_id.as_deref()
    }

    /// Get the property bag.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Get a single property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Get the UTC timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get the numeric value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        self.value
    }

    /// Whether this event was derived by goal or funnel evaluation.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.name == GOAL_COMPLETED || self.name == FUNNEL_STEP_COMPLETED
    }
}

/// Builder for `Event`.
#[derive(Debug)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// Create a new builder with required fields, stamped with the current time.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            event: Event {
                id: Uuid::new_v4(),
                name: name.into(),
                user_id: user_id.into(),
                session_id: session_id.into(),
                experiment_id: None,
                variant_id: None,
                properties: Properties::new(),
                timestamp: Utc::now(),
                value: None,
            },
        }
    }

    /// Tag with an experiment.
    #[must_use]
    pub fn experiment_id(mut self, experiment_id: Option<String>) -> Self {
        self.event.experiment_id = experiment_id;
        self
    }

    /// Tag with a variant.
    #[must_use]
    pub fn variant_id(mut self, variant_id: Option<String>) -> Self {
        self.event.variant_id = variant_id;
        self
    }

    /// Replace the property bag.
    #[must_use]
    pub fn properties(mut self, properties: Properties) -> Self {
        self.event.properties = properties;
        self
    }

    /// Set one property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.event.properties.insert(key.into(), value.into());
        self
    }

    /// Set the numeric value.
    #[must_use]
    pub const fn value(mut self, value: Option<f64>) -> Self {
        self.event.value = value;
        self
    }

    /// Set a custom timestamp (useful for derived events and testing).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Build the `Event`.
    #[must_use]
    pub fn build(self) -> Event {
        self.event
    }
}
