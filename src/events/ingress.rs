//! Event ingress - the `track` entry point

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::{Event, EventLog, IdentityResolver, SessionTracker, SinkDispatcher};
use crate::evaluate::{FunnelTracker, GoalEvaluator};
use crate::experiment::ExperimentRegistry;
use crate::Properties;

/// A tracking call with optional experiment scope.
#[derive(Debug, Clone, Default)]
pub struct TrackRequest {
    name: String,
    properties: Properties,
    user_id: Option<String>,
    experiment_id: Option<String>,
    variant_id: Option<String>,
    value: Option<f64>,
}

impl TrackRequest {
    /// Start a request for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Replace the property bag.
    #[must_use]
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Set one property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Attribute to a known user.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Tag with an experiment.
    #[must_use]
    pub fn experiment(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    /// Tag with a variant.
    #[must_use]
    pub fn variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Attach a numeric value (e.g. order total).
    #[must_use]
    pub const fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Get the event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Accepts tracked events, stamps metadata and feeds the evaluators.
pub struct EventIngress {
    log: Arc<EventLog>,
    identity: IdentityResolver,
    sessions: SessionTracker,
    sinks: SinkDispatcher,
    goals: GoalEvaluator,
    funnels: FunnelTracker,
}

impl EventIngress {
    /// Wire an ingress to the registry and log.
    #[must_use]
    pub fn new(
        registry: Arc<ExperimentRegistry>,
        log: Arc<EventLog>,
        identity: IdentityResolver,
        sessions: SessionTracker,
        sinks: SinkDispatcher,
    ) -> Self {
        Self {
            log,
            identity,
            sessions,
            sinks,
            goals: GoalEvaluator::new(Arc::clone(&registry)),
            funnels: FunnelTracker::new(registry),
        }
    }

    /// Get the event log.
    #[must_use]
    pub const fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Get the identity resolver.
    #[must_use]
    pub const fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// Track an event for `user_id`, or for the anonymous id when absent.
    pub fn track(&self, name: &str, properties: Properties, user_id: Option<&str>) -> Arc<Event> {
        let mut request = TrackRequest::new(name).properties(properties);
        request.user_id = user_id.map(str::to_string);
        self.track_request(request)
    }

    /// Record an event, forward it, then record its derived goal and funnel
    /// events. Returns the recorded source event.
    ///
    /// String `experiment_id` / `variant_id` properties become tags when the
    /// request carries no explicit tag.
    pub fn track_request(&self, request: TrackRequest) -> Arc<Event> {
        let now = Utc::now();
        let user_id = self.identity.resolve(request.user_id.as_deref());
        let session_id = self.sessions.session_at(&user_id, now);

        let experiment_id = request
            .experiment_id
            .or_else(|| string_property(&request.properties, "experiment_id"));
        let variant_id = request
            .variant_id
            .or_else(|| string_property(&request.properties, "variant_id"));

        let event = Event::builder(request.name, user_id, session_id)
            .experiment_id(experiment_id)
            .variant_id(variant_id)
            .properties(request.properties)
            .value(request.value)
            .timestamp(now)
            .build();

        let event = self.record(event);
        debug!(
            event = event.name(),
            user_id = event.user_id(),
            experiment_id = event.experiment_id(),
            "tracked event"
        );

        let derived = self
            .goals
            .evaluate(&event)
            .into_iter()
            .chain(self.funnels.evaluate(&event));
        for derived_event in derived {
            self.record(derived_event);
        }

        event
    }

    fn record(&self, event: Event) -> Arc<Event> {
        let event = self.log.append(event);
        self.sinks.dispatch(&event);
        event
    }
}

fn string_property(properties: &Properties, key: &str) -> Option<String> {
    properties
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
