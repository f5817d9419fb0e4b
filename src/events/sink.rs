//! External event sinks
//!
//! Analytics platforms receive every recorded event through the
//! [`EventSink`] contract. Each adapter owns its own protocol mapping and
//! its own bounded timeout; the dispatcher only guarantees that nothing a
//! sink does (error, panic, slowness) reaches the caller of `track`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Event;
use crate::Result;

/// Adapter forwarding events to an external analytics platform.
///
/// The sink sees the event name, properties, identity and timestamp
/// through [`Event`] and maps them to its platform's vocabulary.
pub trait EventSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery failed. The dispatcher logs and drops it.
    fn forward(&self, event: &Event) -> Result<()>;
}

/// Where sink deliveries run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Detached from the caller (rayon pool, or a spawned thread).
    #[default]
    Background,
    /// On the caller's thread, errors still swallowed.
    Inline,
}

/// Fans events out to registered sinks, fire-and-forget.
#[derive(Default)]
pub struct SinkDispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
    mode: DeliveryMode,
}

impl SinkDispatcher {
    /// Create a dispatcher with no sinks.
    #[must_use]
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            sinks: Vec::new(),
            mode,
        }
    }

    /// Register a sink.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check if no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Get the delivery mode.
    #[must_use]
    pub const fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Hand `event` to every sink. Never blocks on background delivery and
    /// never fails.
    pub fn dispatch(&self, event: &Arc<Event>) {
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let event = Arc::clone(event);
            match self.mode {
                DeliveryMode::Inline => deliver(sink.as_ref(), &event),
                DeliveryMode::Background => spawn(move || deliver(sink.as_ref(), &event)),
            }
        }
    }
}

fn deliver(sink: &dyn EventSink, event: &Event) {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.forward(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(sink = sink.name(), event = event.name(), error = %e, "sink delivery failed"),
        Err(_) => warn!(sink = sink.name(), event = event.name(), "sink panicked during delivery"),
    }
}

#[cfg(feature = "parallel")]
fn spawn<F: FnOnce() + Send + 'static>(job: F) {
    rayon::spawn(job);
}

#[cfg(not(feature = "parallel"))]
fn spawn<F: FnOnce() + Send + 'static>(job: F) {
    std::thread::spawn(job);
}

/// Writes each event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn forward(&self, event: &Event) -> Result<()> {
        info!(
            target: "conversion_lab::sink",
            event = event.name(),
            user_id = event.user_id(),
            session_id = event.session_id(),
            experiment_id = event.experiment_id(),
            variant_id = event.variant_id(),
            timestamp = %event.timestamp(),
            properties = %serde_json::Value::Object(event.properties().clone()),
            "event"
        );
        Ok(())
    }
}

/// Collects forwarded events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of events received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing has been received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn forward(&self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::time::{Duration, Instant};

    struct FailingSink;

    impl EventSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn forward(&self, _event: &Event) -> Result<()> {
            Err(Error::Sink {
                sink: "failing".into(),
                message: "connection refused".into(),
            })
        }
    }

    struct PanickingSink;

    impl EventSink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        fn forward(&self, _event: &Event) -> Result<()> {
            panic!("adapter bug");
        }
    }

    fn event() -> Arc<Event> {
        Arc::new(Event::builder("page_view", "user-1", "s").build())
    }

    #[test]
    fn test_inline_delivery() {
        let memory = Arc::new(MemorySink::new());
        let mut dispatcher = SinkDispatcher::new(DeliveryMode::Inline);
        dispatcher.add_sink(Arc::new(FailingSink));
        dispatcher.add_sink(Arc::new(PanickingSink));
        dispatcher.add_sink(Arc::new(TracingSink));
        dispatcher.add_sink(memory.clone());

        dispatcher.dispatch(&event());
        assert_eq!(memory.len(), 1);
        assert_eq!(dispatcher.len(), 4);
    }

    #[test]
    fn test_background_delivery() {
        let memory = Arc::new(MemorySink::new());
        let mut dispatcher = SinkDispatcher::default();
        dispatcher.add_sink(Arc::new(FailingSink));
        dispatcher.add_sink(memory.clone());

        dispatcher.dispatch(&event());

        let deadline = Instant::now() + Duration::from_secs(5);
        while memory.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_no_sinks() {
        let dispatcher = SinkDispatcher::default();
        assert!(dispatcher.is_empty());
        dispatcher.dispatch(&event());
    }
}
