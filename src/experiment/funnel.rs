//! Funnel - ordered sequence of events forming a user journey

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One step of a funnel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunnelStep {
    id: String,
    #[serde(default)]
    name: String,
    event_name: String,
    order: u32,
}

impl FunnelStep {
    /// Create a step triggered by `event_name` at position `order`.
    #[must_use]
    pub fn new(id: impl Into<String>, event_name: impl Into<String>, order: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            event_name: event_name.into(),
            order,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the step ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the triggering event name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Get the step position.
    #[must_use]
    pub const fn order(&self) -> u32 {
        self.order
    }
}

/// An ordered multi-step journey. Drop-off is measured between adjacent steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Funnel {
    id: String,
    #[serde(default)]
    name: String,
    steps: Vec<FunnelStep>,
}

impl Funnel {
    /// Create a funnel from steps in declared order.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<FunnelStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps,
        }
    }

    /// Get the funnel ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in declared order.
    #[must_use]
    pub fn steps(&self) -> &[FunnelStep] {
        &self.steps
    }

    /// Adjacent `(step n, step n+1)` pairs in declared order.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (&FunnelStep, &FunnelStep)> {
        self.steps.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the funnel has no id or steps, a step
    /// has no event name, two steps share an id, or step orders are not
    /// strictly increasing.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("funnel id must not be empty".into()));
        }
        if self.steps.is_empty() {
            return Err(Error::Validation(format!("funnel '{}' has no steps", self.id)));
        }
        if let Some(step) = self.steps.iter().find(|s| s.event_name.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "funnel '{}' step '{}' has no event name",
                self.id, step.id
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if self.steps[..i].iter().any(|s| s.id == step.id) {
                return Err(Error::Validation(format!(
                    "funnel '{}' has duplicate step id '{}'",
                    self.id, step.id
                )));
            }
        }
        for (prev, next) in self.adjacent_pairs() {
            if next.order <= prev.order {
                return Err(Error::Validation(format!(
                    "funnel '{}' step '{}' (order {}) does not follow '{}' (order {})",
                    self.id, next.id, next.order, prev.id, prev.order
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_funnel(orders: [u32; 3]) -> Funnel {
        Funnel::new(
            "signup",
            "Signup",
            vec![
                FunnelStep::new("landing", "page_view", orders[0]),
                FunnelStep::new("cta", "cta_click", orders[1]),
                FunnelStep::new("form", "signup_completed", orders[2]),
            ],
        )
    }

    #[test]
    fn test_valid_funnel() {
        let funnel = signup_funnel([1, 2, 3]);
        assert!(funnel.validate().is_ok());
        let pairs: Vec<_> = funnel
            .adjacent_pairs()
            .map(|(a, b)| (a.id(), b.id()))
            .collect();
        assert_eq!(pairs, vec![("landing", "cta"), ("cta", "form")]);
    }

    #[test]
    fn test_duplicate_order_rejected() {
        assert!(signup_funnel([1, 2, 2]).validate().is_err());
    }

    #[test]
    fn test_decreasing_order_rejected() {
        let err = signup_funnel([3, 2, 1]).validate().unwrap_err();
        assert!(format!("{err}").contains("does not follow"));
    }

    #[test]
    fn test_duplicate_step_id_rejected() {
        let funnel = Funnel::new(
            "dup",
            "Dup",
            vec![
                FunnelStep::new("landing", "page_view", 1),
                FunnelStep::new("landing", "pricing_view", 2),
            ],
        );
        let err = funnel.validate().unwrap_err();
        assert!(format!("{err}").contains("duplicate step id"));
    }

    #[test]
    fn test_empty_funnel_rejected() {
        assert!(Funnel::new("empty", "Empty", vec![]).validate().is_err());
    }
}
