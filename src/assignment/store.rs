//! Assignment storage
//!
//! [`MemoryAssignmentStore`] is the default backend; assignments are lost on
//! process restart.

use dashmap::DashMap;

/// Persistence seam for `(user_id, experiment_id) -> variant_id` mappings.
///
/// Implementations must make [`get_or_insert_with`](Self::get_or_insert_with)
/// atomic per key: when two callers race on the same key, exactly one
/// computed value is stored and both callers observe it.
pub trait AssignmentStore: Send + Sync {
    /// Get the stored variant for a pair.
    ///
    /// Returns `None` if the pair has never been assigned.
    fn get(&self, user_id: &str, experiment_id: &str) -> Option<String>;

    /// Return the stored variant, computing and storing it if absent.
    fn get_or_insert_with<F>(&self, user_id: &str, experiment_id: &str, compute: F) -> String
    where
        F: FnOnce() -> String;

    /// All `(experiment_id, variant_id)` pairs for a user, ordered by experiment.
    fn for_user(&self, user_id: &str) -> Vec<(String, String)>;

    /// Number of stored assignments.
    fn len(&self) -> usize;

    /// Check if nothing has been assigned yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory assignment store using a lock-free concurrent hashmap.
///
/// The `DashMap` entry API holds the shard lock between lookup and insert,
/// which gives insert-if-absent semantics without a global lock.
///
/// # Example
///
/// ```rust
/// use conversion_lab::assignment::{AssignmentStore, MemoryAssignmentStore};
///
/// let store = MemoryAssignmentStore::new();
/// let first = store.get_or_insert_with("user-1", "exp-1", || "control".to_string());
/// let second = store.get_or_insert_with("user-1", "exp-1", || "treatment".to_string());
/// assert_eq!(first, "control");
/// assert_eq!(second, "control");
/// ```
#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    store: DashMap<(String, String), String>,
}

impl MemoryAssignmentStore {
    /// Create a new in-memory assignment store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
        }
    }

    /// Clear all assignments.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl AssignmentStore for MemoryAssignmentStore {
    fn get(&self, user_id: &str, experiment_id: &str) -> Option<String> {
        self.store
            .get(&(user_id.to_string(), experiment_id.to_string()))
            .map(|v| v.value().clone())
    }

    fn get_or_insert_with<F>(&self, user_id: &str, experiment_id: &str, compute: F) -> String
    where
        F: FnOnce() -> String,
    {
        self.store
            .entry((user_id.to_string(), experiment_id.to_string()))
            .or_insert_with(compute)
            .value()
            .clone()
    }

    fn for_user(&self, user_id: &str) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .store
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        pairs.sort();
        pairs
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing() {
        let store = MemoryAssignmentStore::new();
        assert_eq!(store.get("u", "e"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_first_write_wins() {
        let store = MemoryAssignmentStore::with_capacity(8);
        assert_eq!(store.get_or_insert_with("u", "e", || "a".into()), "a");
        assert_eq!(store.get_or_insert_with("u", "e", || "b".into()), "a");
        assert_eq!(store.get("u", "e").as_deref(), Some("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_compute_not_called_when_present() {
        let store = MemoryAssignmentStore::new();
        store.get_or_insert_with("u", "e", || "a".into());
        let mut called = false;
        store.get_or_insert_with("u", "e", || {
            called = true;
            "b".into()
        });
        assert!(!called);
    }

    #[test]
    fn test_for_user() {
        let store = MemoryAssignmentStore::new();
        store.get_or_insert_with("u1", "exp-b", || "x".into());
        store.get_or_insert_with("u1", "exp-a", || "y".into());
        store.get_or_insert_with("u2", "exp-a", || "z".into());

        assert_eq!(
            store.for_user("u1"),
            vec![
                ("exp-a".to_string(), "y".to_string()),
                ("exp-b".to_string(), "x".to_string())
            ]
        );

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_insert_converges() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryAssignmentStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get_or_insert_with("u", "e", || format!("v{i}")))
            })
            .collect();

        let results: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
    }
}
