//! Experiment record - root entity of the registry

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Variant;
use crate::{Error, Result};

/// Tolerance applied when checking that variant weights sum to 100.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Minimum number of variants an experiment needs.
pub const MIN_VARIANTS: usize = 2;

/// Smallest accepted `min_sample_size`.
pub const MIN_SAMPLE_SIZE: u64 = 100;

const DEFAULT_MIN_SAMPLE_SIZE: u64 = 1000;
const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
const DEFAULT_POWER: f64 = 0.8;

/// Lifecycle status of an experiment.
///
/// ```text
/// draft ──> running <──> paused
///              │           │
///              └──> completed <┘
///
/// draft | running | paused | completed ──> archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Defined but not yet receiving traffic.
    #[default]
    Draft,
    /// Assigning users to variants.
    Running,
    /// Temporarily not assigning; existing assignments are kept.
    Paused,
    /// Finished; may only be archived.
    Completed,
    /// Terminal.
    Archived,
}

impl ExperimentStatus {
    /// Get status name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Whether the lifecycle state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running | Self::Paused, Self::Completed)
                | (
                    Self::Draft | Self::Running | Self::Paused | Self::Completed,
                    Self::Archived
                )
        )
    }

    /// Archived experiments accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Archived)
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An A/B/n experiment definition plus its lifecycle state.
///
/// Definitions are immutable once registered; only the status and the
/// lifecycle timestamps change afterwards, through
/// [`ExperimentRegistry::set_status`](super::ExperimentRegistry::set_status).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: ExperimentStatus,
    variants: Vec<Variant>,
    #[serde(default)]
    primary_metric: Option<String>,
    #[serde(default)]
    secondary_metrics: Vec<String>,
    #[serde(default)]
    guardrail_metrics: Vec<String>,
    #[serde(default)]
    goals: Vec<String>,
    #[serde(default)]
    funnels: Vec<String>,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_min_sample_size")]
    min_sample_size: u64,
    #[serde(default = "default_confidence_level")]
    confidence_level: f64,
    #[serde(default = "default_power")]
    power: f64,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

const fn default_min_sample_size() -> u64 {
    DEFAULT_MIN_SAMPLE_SIZE
}

const fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

const fn default_power() -> f64 {
    DEFAULT_POWER
}

impl Experiment {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Variants in declared order. Assignment walks them in this order.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Look up a variant by ID.
    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id() == variant_id)
    }

    /// Get the primary metric name, if any.
    #[must_use]
    pub fn primary_metric(&self) -> Option<&str> {
        self.primary_metric.as_deref()
    }

    /// Get the secondary metric names.
    #[must_use]
    pub fn secondary_metrics(&self) -> &[String] {
        &self.secondary_metrics
    }

    /// Get the guardrail metric names.
    #[must_use]
    pub fn guardrail_metrics(&self) -> &[String] {
        &self.guardrail_metrics
    }

    /// Conversion goal IDs reported by experiment metrics.
    #[must_use]
    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    /// Funnel IDs attached to this experiment.
    #[must_use]
    pub fn funnels(&self) -> &[String] {
        &self.funnels
    }

    /// Timestamp of the first activation.
    #[must_use]
    pub const fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Timestamp of completion.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Get the minimum sample size per variant.
    #[must_use]
    pub const fn min_sample_size(&self) -> u64 {
        self.min_sample_size
    }

    /// Get the confidence level (e.g. 0.95).
    #[must_use]
    pub const fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Get the statistical power (e.g. 0.8).
    #[must_use]
    pub const fn power(&self) -> f64 {
        self.power
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the last-modified timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Check the definition invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the id is empty, there are fewer than
    /// two variants, a variant id repeats, a weight is outside `(0, 100]`,
    /// the weights do not sum to 100 (within [`WEIGHT_TOLERANCE`]), or
    /// `min_sample_size` is below [`MIN_SAMPLE_SIZE`].
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("experiment id must not be empty".into()));
        }
        if self.variants.len() < MIN_VARIANTS {
            return Err(Error::Validation(format!(
                "experiment '{}' has {} variant(s), at least {MIN_VARIANTS} required",
                self.id,
                self.variants.len()
            )));
        }

        for (i, variant) in self.variants.iter().enumerate() {
            if variant.id().is_empty() {
                return Err(Error::Validation(format!(
                    "experiment '{}' variant #{i} has an empty id",
                    self.id
                )));
            }
            if self.variants[..i].iter().any(|v| v.id() == variant.id()) {
                return Err(Error::Validation(format!(
                    "experiment '{}' declares variant '{}' twice",
                    self.id,
                    variant.id()
                )));
            }
            let weight = variant.weight();
            if !(weight > 0.0 && weight <= 100.0) {
                return Err(Error::Validation(format!(
                    "experiment '{}' variant '{}' has weight {weight}, expected (0, 100]",
                    self.id,
                    variant.id()
                )));
            }
        }

        let total: f64 = self.variants.iter().map(Variant::weight).sum();
        if (total - 100.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::Validation(format!(
                "experiment '{}' variant weights sum to {total}, expected 100",
                self.id
            )));
        }

        if self.min_sample_size < MIN_SAMPLE_SIZE {
            return Err(Error::Validation(format!(
                "experiment '{}' min_sample_size {} is below {MIN_SAMPLE_SIZE}",
                self.id, self.min_sample_size
            )));
        }

        Ok(())
    }

    /// Fill in the id from a config map key when the body omits it.
    pub(crate) fn with_default_id(mut self, id: &str) -> Self {
        if self.id.is_empty() {
            self.id = id.to_string();
        }
        self
    }

    /// Apply a status change and stamp the lifecycle timestamps.
    pub(crate) fn apply_status(&mut self, status: ExperimentStatus, now: DateTime<Utc>) {
        match status {
            ExperimentStatus::Running if self.start_date.is_none() => self.start_date = Some(now),
            ExperimentStatus::Completed => self.end_date = Some(now),
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    experiment: Experiment,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            experiment: Experiment {
                id: id.into(),
                name: name.into(),
                description: String::new(),
                status: ExperimentStatus::Draft,
                variants: Vec::new(),
                primary_metric: None,
                secondary_metrics: Vec::new(),
                guardrail_metrics: Vec::new(),
                goals: Vec::new(),
                funnels: Vec::new(),
                start_date: None,
                end_date: None,
                min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
                confidence_level: DEFAULT_CONFIDENCE_LEVEL,
                power: DEFAULT_POWER,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.experiment.description = description.into();
        self
    }

    /// Set the initial status (defaults to draft).
    #[must_use]
    pub const fn status(mut self, status: ExperimentStatus) -> Self {
        self.experiment.status = status;
        self
    }

    /// Append a variant. Declaration order is significant for assignment.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.experiment.variants.push(variant);
        self
    }

    /// Replace all variants.
    #[must_use]
    pub fn variants(mut self, variants: Vec<Variant>) -> Self {
        self.experiment.variants = variants;
        self
    }

    /// Set the primary metric.
    #[must_use]
    pub fn primary_metric(mut self, metric: impl Into<String>) -> Self {
        self.experiment.primary_metric = Some(metric.into());
        self
    }

    /// Add a secondary metric.
    #[must_use]
    pub fn secondary_metric(mut self, metric: impl Into<String>) -> Self {
        self.experiment.secondary_metrics.push(metric.into());
        self
    }

    /// Add a guardrail metric.
    #[must_use]
    pub fn guardrail_metric(mut self, metric: impl Into<String>) -> Self {
        self.experiment.guardrail_metrics.push(metric.into());
        self
    }

    /// Attach a conversion goal by ID.
    #[must_use]
    pub fn goal(mut self, goal_id: impl Into<String>) -> Self {
        self.experiment.goals.push(goal_id.into());
        self
    }

    /// Attach a funnel by ID.
    #[must_use]
    pub fn funnel(mut self, funnel_id: impl Into<String>) -> Self {
        self.experiment.funnels.push(funnel_id.into());
        self
    }

    /// Set the minimum sample size per variant.
    #[must_use]
    pub const fn min_sample_size(mut self, n: u64) -> Self {
        self.experiment.min_sample_size = n;
        self
    }

    /// Set the confidence level.
    #[must_use]
    pub const fn confidence_level(mut self, level: f64) -> Self {
        self.experiment.confidence_level = level;
        self
    }

    /// Set the statistical power.
    #[must_use]
    pub const fn power(mut self, power: f64) -> Self {
        self.experiment.power = power;
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.experiment.created_at = created_at;
        self.experiment.updated_at = created_at;
        self
    }

    /// Build the `Experiment`. Validation happens at registration.
    #[must_use]
    pub fn build(self) -> Experiment {
        self.experiment
    }
}
