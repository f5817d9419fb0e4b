//! Variant - one treatment arm of an experiment

use serde::{Deserialize, Serialize};

use crate::Properties;

/// One treatment arm with its traffic weight.
///
/// `weight` is a percentage of traffic in `(0, 100]`; the weights of all
/// variants in an experiment sum to 100. `config` is opaque to the engine
/// and handed back to rendering code through
/// [`VariantAssigner::variant_config`](crate::assignment::VariantAssigner::variant_config).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    id: String,
    weight: f64,
    #[serde(default)]
    config: Properties,
    #[serde(default)]
    description: String,
}

impl Variant {
    /// Create a variant with an empty configuration.
    #[must_use]
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            config: Properties::new(),
            description: String::new(),
        }
    }

    /// Attach the rendering configuration.
    #[must_use]
    pub fn with_config(mut self, config: Properties) -> Self {
        self.config = config;
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Get the variant ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the traffic weight (percent).
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Get the opaque configuration map.
    #[must_use]
    pub const fn config(&self) -> &Properties {
        &self.config
    }

    /// Get the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}
