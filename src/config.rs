//! Static engine configuration
//!
//! Experiments, goals and funnels are supplied as a JSON document loaded at
//! startup:
//!
//! ```json
//! {
//!   "experiments": {
//!     "hero-cta": {
//!       "name": "Hero CTA copy",
//!       "status": "running",
//!       "variants": [
//!         {"id": "control", "weight": 50},
//!         {"id": "urgent", "weight": 50, "config": {"cta": "Start today"}}
//!       ],
//!       "goals": ["signup"]
//!     }
//!   },
//!   "goals": [{"id": "signup", "event_name": "signup_completed"}],
//!   "funnels": [{
//!     "id": "onboarding",
//!     "steps": [
//!       {"id": "landing", "event_name": "page_view", "order": 1},
//!       {"id": "cta", "event_name": "cta_click", "order": 2}
//!     ]
//!   }],
//!   "session_timeout_minutes": 30
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::events::{DeliveryMode, DEFAULT_SESSION_TIMEOUT_MINUTES};
use crate::experiment::{ConversionGoal, Experiment, Funnel};
use crate::{Error, Result};

/// Startup configuration for [`ExperimentEngine`](crate::ExperimentEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Experiment id -> definition. A definition without an `id` takes the key.
    #[serde(default)]
    pub experiments: BTreeMap<String, Experiment>,
    /// Conversion goals.
    #[serde(default)]
    pub goals: Vec<ConversionGoal>,
    /// Funnels.
    #[serde(default)]
    pub funnels: Vec<Funnel>,
    /// Inactivity window before a new session id is issued.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: i64,
    /// File persisting the anonymous id; in-memory when unset.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Where sink deliveries run.
    #[serde(default)]
    pub delivery: DeliveryMode,
}

const fn default_session_timeout() -> i64 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            experiments: BTreeMap::new(),
            goals: Vec::new(),
            funnels: Vec::new(),
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            identity_file: None,
            delivery: DeliveryMode::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is malformed or fails
    /// [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid config document: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Check engine-level settings. Definitions are validated on registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the session timeout is not positive or
    /// does not fit a `chrono::Duration`.
    pub fn validate(&self) -> Result<()> {
        self.session_timeout().map(|_| ())
    }

    /// Session inactivity timeout as a `chrono::Duration`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is not positive or overflows.
    pub fn session_timeout(&self) -> Result<Duration> {
        let minutes = self.session_timeout_minutes;
        if minutes <= 0 {
            return Err(Error::Config(format!(
                "session_timeout_minutes must be positive, got {minutes}"
            )));
        }
        Duration::try_minutes(minutes).ok_or_else(|| {
            Error::Config(format!(
                "session_timeout_minutes {minutes} exceeds the supported duration range"
            ))
        })
    }

    /// Experiments with ids filled in from their map keys.
    pub fn experiment_definitions(&self) -> impl Iterator<Item = Experiment> + '_ {
        self.experiments
            .iter()
            .map(|(id, experiment)| experiment.clone().with_default_id(id))
    }
}
