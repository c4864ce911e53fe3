//! Human-readable event surface
//!
//! The engine records one event per notable outcome (request, compare,
//! update, cleanup) so operators can follow a certificate's lifecycle without
//! log archaeology.

use certsync_core::NamespacedName;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// Event reasons recorded by the engine.
pub mod reason {
    pub const SUCCESSFUL_SYNC: &str = "SuccessfulSync";
    pub const REQUEST_ERROR: &str = "RequestError";
    pub const COMPARE_ERROR: &str = "CompareError";
    pub const UPDATE_ERROR: &str = "UpdateError";
    pub const CLEANUP_ERROR: &str = "CleanupError";
    pub const SUCCESSFUL_CLEANUP: &str = "SuccessfulCleanup";
}

/// Sink for per-object events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, key: &NamespacedName, kind: EventKind, reason: &str, message: &str);
}

/// Records events into the tracing log.
#[derive(Debug, Default)]
pub struct TracingEventRecorder;

impl EventRecorder for TracingEventRecorder {
    fn record(&self, key: &NamespacedName, kind: EventKind, reason: &str, message: &str) {
        match kind {
            EventKind::Normal => info!("{}: {}: {}", key, reason, message),
            EventKind::Warning => warn!("{}: {}: {}", key, reason, message),
        }
    }
}

pub mod test_utils {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    pub struct RecordedEvent {
        pub key: NamespacedName,
        pub kind: EventKind,
        pub reason: String,
        pub message: String,
    }

    /// Collects events in memory for assertions.
    #[derive(Debug, Default)]
    pub struct MemoryEventRecorder {
        events: Mutex<Vec<RecordedEvent>>,
    }

    impl MemoryEventRecorder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<RecordedEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn reasons(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|event| event.reason.clone())
                .collect()
        }
    }

    impl EventRecorder for MemoryEventRecorder {
        fn record(&self, key: &NamespacedName, kind: EventKind, reason: &str, message: &str) {
            self.events.lock().unwrap().push(RecordedEvent {
                key: key.clone(),
                kind,
                reason: reason.to_string(),
                message: message.to_string(),
            });
        }
    }
}
