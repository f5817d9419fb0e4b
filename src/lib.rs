//! # conversion-lab: Embedded Experiment Assignment and Conversion Analytics
//!
//! **Version**: 0.1.0
//!
//! conversion-lab buckets users into A/B/n experiment variants with a
//! stable, cross-language hash, records tracked events in an append-only
//! log, derives goal completions and funnel steps from them, and answers
//! conversion queries over the log.
//!
//! ## Design Principles
//!
//! - **Reproducible assignment**: FNV-1a 32-bit over `user_id || experiment_id`,
//!   first assignment persisted and never recomputed
//! - **Append-only log**: events are immutable; metrics scan on demand
//! - **Fire-and-forget sinks**: analytics platforms never block or fail `track`
//! - **No global state**: one registry per engine, shared by `Arc`
//!
//! ## Example Usage
//!
//! ```rust
//! use conversion_lab::experiment::{ConversionGoal, Experiment, ExperimentStatus, Variant};
//! use conversion_lab::{ExperimentEngine, Properties};
//!
//! let engine = ExperimentEngine::builder().build()?;
//! engine.registry().register_goal(ConversionGoal::new("signup", "signup_completed"))?;
//! engine.registry().create(
//!     Experiment::builder("hero-cta", "Hero CTA copy")
//!         .variant(Variant::new("control", 50.0))
//!         .variant(Variant::new("urgent", 50.0))
//!         .goal("signup")
//!         .build(),
//! )?;
//! engine.registry().set_status("hero-cta", ExperimentStatus::Running)?;
//!
//! let variant = engine.assign("user-1", "hero-cta").unwrap();
//! engine.track_in_experiment("hero-cta", "signup_completed", Properties::new(), Some("user-1"));
//!
//! let rate = engine.conversion_rate("signup", Some("hero-cta"), Some(&variant));
//! assert!(rate > 0.0);
//! # Ok::<(), conversion_lab::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod assignment;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod events;
pub mod experiment;
pub mod logging;
pub mod query;

use std::sync::Arc;

use tracing::info;

pub use error::{Error, Result};

use assignment::VariantAssigner;
use config::EngineConfig;
use events::{
    Event, EventIngress, EventLog, EventSink, FileIdentityStore, IdentityResolver, IdentityStore,
    MemoryIdentityStore, SessionTracker, SinkDispatcher, TrackRequest,
};
use experiment::ExperimentRegistry;
use query::{FunnelRates, MetricsQuery, Scope, VariantSummary};

/// Event property bag and variant configuration map.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Engine instance: registry, assigner, ingress and metrics wired together.
pub struct ExperimentEngine {
    registry: Arc<ExperimentRegistry>,
    assigner: VariantAssigner,
    ingress: EventIngress,
    metrics: MetricsQuery,
}

impl ExperimentEngine {
    /// Create a new engine builder
    #[must_use]
    pub fn builder() -> ExperimentEngineBuilder {
        ExperimentEngineBuilder::default()
    }

    /// Build an engine from static configuration.
    ///
    /// # Errors
    ///
    /// Returns the first definition or configuration error.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Get the experiment registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ExperimentRegistry> {
        &self.registry
    }

    /// Get the variant assigner.
    #[must_use]
    pub const fn assigner(&self) -> &VariantAssigner {
        &self.assigner
    }

    /// Get the event ingress.
    #[must_use]
    pub const fn ingress(&self) -> &EventIngress {
        &self.ingress
    }

    /// Get the metrics query view.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsQuery {
        &self.metrics
    }

    /// Get the event log.
    #[must_use]
    pub const fn log(&self) -> &Arc<EventLog> {
        self.ingress.log()
    }

    /// Variant of `experiment_id` for `user_id`, or `None` if the experiment
    /// is unknown or not running.
    #[must_use]
    pub fn assign(&self, user_id: &str, experiment_id: &str) -> Option<String> {
        self.assigner.assign(user_id, experiment_id)
    }

    /// Configuration map of the variant assigned to `user_id`.
    #[must_use]
    pub fn variant_config(&self, user_id: &str, experiment_id: &str) -> Option<Properties> {
        self.assigner.variant_config(user_id, experiment_id)
    }

    /// Track an event; `None` attributes it to the anonymous id.
    pub fn track(&self, name: &str, properties: Properties, user_id: Option<&str>) -> Arc<Event> {
        self.ingress.track(name, properties, user_id)
    }

    /// Track a fully specified request.
    pub fn track_request(&self, request: TrackRequest) -> Arc<Event> {
        self.ingress.track_request(request)
    }

    /// Track an event tagged with `experiment_id` and the user's existing
    /// variant. Does not bucket users who have no assignment yet.
    pub fn track_in_experiment(
        &self,
        experiment_id: &str,
        name: &str,
        properties: Properties,
        user_id: Option<&str>,
    ) -> Arc<Event> {
        let user_id = self.ingress.identity().resolve(user_id);
        let mut request = TrackRequest::new(name)
            .properties(properties)
            .experiment(experiment_id);
        if let Some(variant_id) = self.assigner.assignment(&user_id, experiment_id) {
            request = request.variant(variant_id);
        }
        self.ingress.track_request(request.user_id(user_id))
    }

    /// Conversion rate (percent) of `goal_id` within the optional scope.
    #[must_use]
    pub fn conversion_rate(
        &self,
        goal_id: &str,
        experiment_id: Option<&str>,
        variant_id: Option<&str>,
    ) -> f64 {
        self.metrics
            .conversion_rate(goal_id, &Scope::new(experiment_id, variant_id))
    }

    /// Step-to-step conversion rates of `funnel_id` within the optional scope.
    #[must_use]
    pub fn funnel_conversion_rates(
        &self,
        funnel_id: &str,
        experiment_id: Option<&str>,
        variant_id: Option<&str>,
    ) -> FunnelRates {
        self.metrics
            .funnel_conversion_rates(funnel_id, &Scope::new(experiment_id, variant_id))
    }

    /// Per-variant summary of `experiment_id`.
    #[must_use]
    pub fn experiment_metrics(&self, experiment_id: &str) -> Vec<VariantSummary> {
        self.metrics.experiment_metrics(experiment_id)
    }
}

/// Engine builder
#[derive(Default)]
pub struct ExperimentEngineBuilder {
    config: EngineConfig,
    sinks: Vec<Arc<dyn EventSink>>,
    identity_store: Option<Box<dyn IdentityStore>>,
}

impl ExperimentEngineBuilder {
    /// Use static configuration (experiments, goals, funnels, sessions)
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an event sink
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Override the anonymous identity store
    #[must_use]
    pub fn identity_store(mut self, store: Box<dyn IdentityStore>) -> Self {
        self.identity_store = Some(store);
        self
    }

    /// Build the engine
    ///
    /// Goals and funnels are registered before experiments.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration or any definition is invalid
    pub fn build(self) -> Result<ExperimentEngine> {
        let config = self.config;
        let session_timeout = config.session_timeout()?;

        let registry = Arc::new(ExperimentRegistry::new());
        for goal in &config.goals {
            registry.register_goal(goal.clone())?;
        }
        for funnel in &config.funnels {
            registry.register_funnel(funnel.clone())?;
        }
        for experiment in config.experiment_definitions() {
            registry.create(experiment)?;
        }

        let identity_store: Box<dyn IdentityStore> = match (self.identity_store, &config.identity_file) {
            (Some(store), _) => store,
            (None, Some(path)) => Box::new(FileIdentityStore::new(path)),
            (None, None) => Box::new(MemoryIdentityStore::new()),
        };

        let mut sinks = SinkDispatcher::new(config.delivery);
        for sink in self.sinks {
            sinks.add_sink(sink);
        }

        let log = Arc::new(EventLog::new());
        let ingress = EventIngress::new(
            Arc::clone(&registry),
            Arc::clone(&log),
            IdentityResolver::new(identity_store),
            SessionTracker::new(session_timeout),
            sinks,
        );

        info!(
            experiments = registry.len(),
            running = registry.list_running().len(),
            "engine ready"
        );

        Ok(ExperimentEngine {
            assigner: VariantAssigner::new(Arc::clone(&registry)),
            metrics: MetricsQuery::new(log, Arc::clone(&registry)),
            ingress,
            registry,
        })
    }
}
