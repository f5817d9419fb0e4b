//! Derived-event evaluation
//!
//! Both evaluators are pure with respect to the log: they take a recorded
//! event and return the derived events it produces. The ingress appends
//! those to the log in the same `track` call.

mod funnels;
mod goals;

pub use funnels::FunnelTracker;
pub use goals::{filters_match, GoalEvaluator};
