//! Session tracking
//!
//! Each user has their own session. A session id is reused while that
//! user's events keep arriving; after the inactivity timeout elapses a fresh
//! id is issued.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Default inactivity window before a new session starts.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug)]
struct Session {
    id: String,
    last_seen: DateTime<Utc>,
}

impl Session {
    fn start(user_id: &str, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4().to_string();
        debug!(user_id, session_id = %id, "started session");
        Self { id, last_seen: now }
    }
}

/// Issues and rotates session ids per user.
///
/// Sessions live in a `DashMap` keyed by user id, so concurrent users only
/// contend when they hash to the same shard.
#[derive(Debug)]
pub struct SessionTracker {
    timeout: Duration,
    sessions: DashMap<String, Session>,
}

impl SessionTracker {
    /// Create a tracker with the given inactivity timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sessions: DashMap::new(),
        }
    }

    /// Get the inactivity timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of users with a tracked session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no session has been started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session id of `user_id` for an event observed at `now`.
    ///
    /// Reuses the user's session unless it has been idle longer than the
    /// timeout, and refreshes its last-seen time.
    pub fn session_at(&self, user_id: &str, now: DateTime<Utc>) -> String {
        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut slot) => {
                let session = slot.get_mut();
                if now - session.last_seen > self.timeout {
                    *session = Session::start(user_id, now);
                } else if now > session.last_seen {
                    session.last_seen = now;
                }
                session.id.clone()
            }
            Entry::Vacant(slot) => slot.insert(Session::start(user_id, now)).id.clone(),
        }
    }

    /// Session id of `user_id` for an event observed now.
    pub fn session(&self, user_id: &str) -> String {
        self.session_at(user_id, Utc::now())
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TIMEOUT_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_reused_within_timeout() {
        let tracker = SessionTracker::default();
        let t0 = Utc::now();
        let first = tracker.session_at("alice", t0);
        assert_eq!(tracker.session_at("alice", t0 + Duration::minutes(29)), first);
        // Activity refreshes the window
        assert_eq!(tracker.session_at("alice", t0 + Duration::minutes(58)), first);
    }

    #[test]
    fn test_session_rotates_after_timeout() {
        let tracker = SessionTracker::new(Duration::minutes(5));
        let t0 = Utc::now();
        let first = tracker.session_at("alice", t0);
        let second = tracker.session_at("alice", t0 + Duration::minutes(6));
        assert_ne!(first, second);
        assert_eq!(tracker.session_at("alice", t0 + Duration::minutes(7)), second);
    }

    #[test]
    fn test_sessions_are_per_user() {
        let tracker = SessionTracker::new(Duration::minutes(5));
        let t0 = Utc::now();
        let alice = tracker.session_at("alice", t0);
        let bob = tracker.session_at("bob", t0);
        assert_ne!(alice, bob);
        assert_eq!(tracker.len(), 2);

        // Bob staying active does not keep Alice's session alive
        for minute in 1..=10 {
            tracker.session_at("bob", t0 + Duration::minutes(minute));
        }
        assert_eq!(tracker.session_at("bob", t0 + Duration::minutes(11)), bob);
        assert_ne!(tracker.session_at("alice", t0 + Duration::minutes(11)), alice);
    }
}
