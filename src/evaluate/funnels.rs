//! Funnel step tracking

use std::sync::Arc;

use tracing::debug;

use crate::events::{Event, FUNNEL_STEP_COMPLETED};
use crate::experiment::{ExperimentRegistry, Funnel, FunnelStep};

/// Matches events against registered funnel steps.
///
/// Step order is validated when the funnel is registered; evaluation only
/// looks at event names.
pub struct FunnelTracker {
    registry: Arc<ExperimentRegistry>,
}

impl FunnelTracker {
    /// Create a tracker reading funnels from `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self { registry }
    }

    /// Derived `funnel_step_completed` events for every step `event` triggers.
    #[must_use]
    pub fn evaluate(&self, event: &Event) -> Vec<Event> {
        if event.is_derived() {
            return Vec::new();
        }

        let mut derived = Vec::new();
        for funnel in self.registry.funnels() {
            for step in funnel.steps().iter().filter(|s| s.event_name() == event.name()) {
                debug!(
                    funnel_id = funnel.id(),
                    step_id = step.id(),
                    user_id = event.user_id(),
                    "funnel step completed"
                );
                derived.push(step_completion(&funnel, step, event));
            }
        }
        derived
    }
}

fn step_completion(funnel: &Funnel, step: &FunnelStep, source: &Event) -> Event {
    Event::builder(FUNNEL_STEP_COMPLETED, source.user_id(), source.session_id())
        .experiment_id(source.experiment_id().map(str::to_string))
        .variant_id(source.variant_id().map(str::to_string))
        .property("funnel_id", funnel.id())
        .property("funnel_name", funnel.name())
        .property("step_id", step.id())
        .property("step_order", step.order())
        .property("source_event", source.name())
        .timestamp(source.timestamp())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FunnelTracker {
        let registry = Arc::new(ExperimentRegistry::new());
        registry
            .register_funnel(Funnel::new(
                "signup",
                "Signup",
                vec![
                    FunnelStep::new("landing", "page_view", 1),
                    FunnelStep::new("cta", "cta_click", 2),
                ],
            ))
            .unwrap();
        registry
            .register_funnel(Funnel::new(
                "browse",
                "Browse",
                vec![FunnelStep::new("any_view", "page_view", 10)],
            ))
            .unwrap();
        FunnelTracker::new(registry)
    }

    #[test]
    fn test_step_emitted_per_matching_funnel() {
        let event = Event::builder("page_view", "u1", "s1")
            .experiment_id(Some("exp".into()))
            .variant_id(Some("b".into()))
            .build();
        let derived = tracker().evaluate(&event);

        assert_eq!(derived.len(), 2);
        // Funnels are visited in id order
        assert_eq!(derived[0].property("funnel_id").unwrap(), "browse");
        assert_eq!(derived[1].property("funnel_id").unwrap(), "signup");
        assert_eq!(derived[1].property("step_id").unwrap(), "landing");
        assert_eq!(derived[1].property("step_order").unwrap(), 1);
        assert_eq!(derived[1].variant_id(), Some("b"));
    }

    #[test]
    fn test_unmatched_event() {
        let event = Event::builder("logout", "u1", "s1").build();
        assert!(tracker().evaluate(&event).is_empty());
    }

    #[test]
    fn test_derived_events_ignored() {
        let event = Event::builder(FUNNEL_STEP_COMPLETED, "u1", "s1").build();
        assert!(tracker().evaluate(&event).is_empty());
    }
}
