//! Append-only event log
//!
//! **Append-only design**: events are pushed, never updated or removed.
//! Readers take a snapshot of `Arc<Event>` handles and aggregate over it
//! without holding the lock, so metric scans do not stall `track`.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

use super::Event;
use crate::Result;

/// Concurrent append-only store of tracked and derived events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<Arc<Event>>>,
}

impl EventLog {
    /// Create a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return the shared handle to it.
    pub fn append(&self, event: Event) -> Arc<Event> {
        let event = Arc::new(event);
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&event));
        event
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of the log in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events with the given name, in append order.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Arc<Event>> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.name() == name)
            .cloned()
            .collect()
    }

    /// Write the log as JSON lines, one event per line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying writer fails.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> Result<usize> {
        let snapshot = self.snapshot();
        for event in &snapshot {
            serde_json::to_writer(&mut writer, event.as_ref())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(snapshot.len())
    }
}
