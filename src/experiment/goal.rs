//! Conversion goal - an event pattern counted as a success signal

use serde::{Deserialize, Serialize};

use crate::{Error, Properties, Result};

/// How a completed goal contributes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalValue {
    /// Converted or not; each completion is worth 1.
    #[default]
    Binary,
    /// Every matching event counts once.
    Count,
    /// Completion carries the triggering event's monetary value.
    Revenue,
}

impl GoalValue {
    /// Get the value semantics as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Count => "count",
            Self::Revenue => "revenue",
        }
    }
}

/// A named event pattern with optional equality filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionGoal {
    id: String,
    #[serde(default)]
    name: String,
    event_name: String,
    #[serde(default, rename = "value")]
    value_type: GoalValue,
    #[serde(default)]
    filters: Properties,
}

impl ConversionGoal {
    /// Create a binary goal triggered by `event_name`.
    #[must_use]
    pub fn new(id: impl Into<String>, event_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            event_name: event_name.into(),
            value_type: GoalValue::Binary,
            filters: Properties::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the value semantics.
    #[must_use]
    pub const fn with_value_type(mut self, value_type: GoalValue) -> Self {
        self.value_type = value_type;
        self
    }

    /// Require `key` to equal `value` on the triggering event.
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Get the goal ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name (falls back to the ID).
    #[must_use]
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Get the triggering event name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Get the value semantics.
    #[must_use]
    pub const fn value_type(&self) -> GoalValue {
        self.value_type
    }

    /// Get the property equality filters.
    #[must_use]
    pub const fn filters(&self) -> &Properties {
        &self.filters
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the id or event name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("goal id must not be empty".into()));
        }
        if self.event_name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "goal '{}' has no triggering event name",
                self.id
            )));
        }
        Ok(())
    }
}
