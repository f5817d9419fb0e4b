//! Event tracking
//!
//! ```text
//! track() ──> resolve identity + session ──> EventLog::append
//!                                              │
//!                                              ├──> SinkDispatcher (fire-and-forget)
//!                                              ├──> GoalEvaluator ──> goal_completed
//!                                              └──> FunnelTracker ──> funnel_step_completed
//! ```

mod event_record;
pub mod identity;
mod ingress;
mod log;
mod session;
mod sink;

pub use event_record::{Event, EventBuilder, FUNNEL_STEP_COMPLETED, GOAL_COMPLETED};
pub use identity::{FileIdentityStore, IdentityResolver, IdentityStore, MemoryIdentityStore};
pub use ingress::{EventIngress, TrackRequest};
pub use log::EventLog;
pub use session::{SessionTracker, DEFAULT_SESSION_TIMEOUT_MINUTES};
pub use sink::{DeliveryMode, EventSink, MemorySink, SinkDispatcher, TracingSink};
