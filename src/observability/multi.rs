//! Fan-out observer that dispatches to multiple backends.
//!
//! Useful for combining backends, e.g. tracing logs plus an operator
//! console sink simultaneously.
use crate::observability::traits::{LauncherEvent, Observer};

/// Dispatches events to all inner observers.
pub struct MultiObserver {
    observers: Vec<Box<dyn Observer>>,
}

impl MultiObserver {
    /// Create from a list of observers. If the list is empty the result
    /// behaves like a noop.
    pub fn new(observers: Vec<Box<dyn Observer>>) -> Self {
        Self { observers }
    }
}

impl Observer for MultiObserver {
    fn record_event(&self, event: &LauncherEvent) {
        for obs in &self.observers {
            obs.record_event(event);
        }
    }

    fn flush(&self) {
        for obs in &self.observers {
            obs.flush();
        }
    }

    fn name(&self) -> &str {
        "multi"
    }
}
