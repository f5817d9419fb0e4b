//! Experiment definitions and registry
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Variant (2..N)   [weights sum to 100]
//!      │
//!      ├──> ConversionGoal ids
//!      └──> Funnel ids ──< FunnelStep (1..N) [strictly increasing order]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use conversion_lab::experiment::{Experiment, ExperimentRegistry, ExperimentStatus, Variant};
//!
//! let registry = ExperimentRegistry::new();
//! let experiment = Experiment::builder("hero-cta", "Hero CTA copy")
//!     .variant(Variant::new("control", 50.0))
//!     .variant(Variant::new("urgent", 50.0))
//!     .build();
//!
//! registry.create(experiment)?;
//! registry.set_status("hero-cta", ExperimentStatus::Running)?;
//! assert_eq!(registry.list_running().len(), 1);
//! # Ok::<(), conversion_lab::Error>(())
//! ```

mod experiment_record;
mod funnel;
mod goal;
mod registry;
mod variant;

pub use experiment_record::{
    Experiment, ExperimentBuilder, ExperimentStatus, MIN_SAMPLE_SIZE, MIN_VARIANTS,
    WEIGHT_TOLERANCE,
};
pub use funnel::{Funnel, FunnelStep};
pub use goal::{ConversionGoal, GoalValue};
pub use registry::ExperimentRegistry;
pub use variant::Variant;
