//! Experiment Registry - validated definitions and lifecycle state
//!
//! The registry is constructed once at startup and shared by reference
//! (`Arc<ExperimentRegistry>`) with the assigner and the event ingress.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use super::{ConversionGoal, Experiment, ExperimentStatus, Funnel};
use crate::{Error, Result};

/// Concurrent store of experiment, goal and funnel definitions.
///
/// ## Design
///
/// Each map is a `DashMap`, so status changes lock a single shard and
/// readers of other experiments are never blocked. Reads hand out clones;
/// a returned `Experiment` is a snapshot and does not track later status
/// changes.
#[derive(Debug, Default)]
pub struct ExperimentRegistry {
    experiments: DashMap<String, Experiment>,
    goals: DashMap<String, ConversionGoal>,
    funnels: DashMap<String, Funnel>,
}

impl ExperimentRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the registry holds no experiments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Get the number of registered experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Validate and register an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the definition breaks an invariant
    /// (see [`Experiment::validate`]) or the id is already registered.
    /// Nothing is stored on failure.
    pub fn create(&self, experiment: Experiment) -> Result<Experiment> {
        if let Err(e) = experiment.validate() {
            warn!(experiment_id = experiment.id(), error = %e, "rejected experiment definition");
            return Err(e);
        }

        match self.experiments.entry(experiment.id().to_string()) {
            Entry::Occupied(_) => Err(Error::Validation(format!(
                "experiment '{}' already exists",
                experiment.id()
            ))),
            Entry::Vacant(slot) => {
                info!(
                    experiment_id = experiment.id(),
                    status = %experiment.status(),
                    variants = experiment.variants().len(),
                    "experiment created"
                );
                slot.insert(experiment.clone());
                Ok(experiment)
            }
        }
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get(&self, experiment_id: &str) -> Option<Experiment> {
        self.experiments.get(experiment_id).map(|e| e.value().clone())
    }

    /// Get only the status of an experiment.
    #[must_use]
    pub fn status(&self, experiment_id: &str) -> Option<ExperimentStatus> {
        self.experiments.get(experiment_id).map(|e| e.status())
    }

    /// Move an experiment along the lifecycle state machine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`Error::InvalidTransition`] when the state machine forbids the move;
    /// the stored status is unchanged in both cases.
    pub fn set_status(&self, experiment_id: &str, status: ExperimentStatus) -> Result<Experiment> {
        let mut entry = self
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| Error::NotFound(format!("experiment '{experiment_id}'")))?;

        let from = entry.status();
        if !from.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                experiment_id: experiment_id.to_string(),
                from,
                to: status,
            });
        }
        if status == ExperimentStatus::Running {
            entry.validate()?;
        }

        entry.apply_status(status, Utc::now());
        info!(experiment_id, %from, to = %status, "experiment status changed");
        Ok(entry.value().clone())
    }

    /// All experiments currently running, ordered by ID.
    #[must_use]
    pub fn list_running(&self) -> Vec<Experiment> {
        let mut running: Vec<Experiment> = self
            .experiments
            .iter()
            .filter(|e| e.status() == ExperimentStatus::Running)
            .map(|e| e.value().clone())
            .collect();
        running.sort_by(|a, b| a.id().cmp(b.id()));
        running
    }

    /// All experiments, ordered by ID.
    #[must_use]
    pub fn list(&self) -> Vec<Experiment> {
        let mut all: Vec<Experiment> = self.experiments.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Register a conversion goal, replacing any goal with the same ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the goal has no id or event name.
    pub fn register_goal(&self, goal: ConversionGoal) -> Result<()> {
        goal.validate()?;
        info!(goal_id = goal.id(), event = goal.event_name(), "goal registered");
        self.goals.insert(goal.id().to_string(), goal);
        Ok(())
    }

    /// Get a goal by ID.
    #[must_use]
    pub fn goal(&self, goal_id: &str) -> Option<ConversionGoal> {
        self.goals.get(goal_id).map(|g| g.value().clone())
    }

    /// Goals triggered by `event_name`, ordered by ID.
    #[must_use]
    pub fn goals_for_event(&self, event_name: &str) -> Vec<ConversionGoal> {
        let mut goals: Vec<ConversionGoal> = self
            .goals
            .iter()
            .filter(|g| g.event_name() == event_name)
            .map(|g| g.value().clone())
            .collect();
        goals.sort_by(|a, b| a.id().cmp(b.id()));
        goals
    }

    /// Register a funnel, replacing any funnel with the same ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if step orders are not strictly
    /// increasing or the funnel is otherwise malformed.
    pub fn register_funnel(&self, funnel: Funnel) -> Result<()> {
        funnel.validate()?;
        info!(funnel_id = funnel.id(), steps = funnel.steps().len(), "funnel registered");
        self.funnels.insert(funnel.id().to_string(), funnel);
        Ok(())
    }

    /// Get a funnel by ID.
    #[must_use]
    pub fn funnel(&self, funnel_id: &str) -> Option<Funnel> {
        self.funnels.get(funnel_id).map(|f| f.value().clone())
    }

    /// All funnels, ordered by ID.
    #[must_use]
    pub fn funnels(&self) -> Vec<Funnel> {
        let mut funnels: Vec<Funnel> = self.funnels.iter().map(|f| f.value().clone()).collect();
        funnels.sort_by(|a, b| a.id().cmp(b.id()));
        funnels
    }
}
