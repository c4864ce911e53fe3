//! Controller configuration
//!
//! A single `SyncConfig` value is constructed at startup and passed into the
//! engine and sweeper constructors; there is no ambient global state.

use std::time::Duration;

/// Configuration consumed by the reconciliation engine and the orphan sweeper.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Owner id written into the `certsync/owner` tag on every certificate
    /// this system requests, and checked before any deletion.
    pub owner_id: String,
    /// Interval between orphan sweeps.
    pub sweep_interval: Duration,
    /// Requeue delay while the CA has not yet computed validation records.
    pub not_ready_requeue: Duration,
    /// Requeue delay while a certificate exists but is not yet issued.
    pub pending_requeue: Duration,
    /// Number of reconcile workers processing distinct keys in parallel.
    pub workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            owner_id: "certsync".to_string(),
            sweep_interval: Duration::from_secs(6 * 60 * 60),
            not_ready_requeue: Duration::from_secs(5),
            pending_requeue: Duration::from_secs(15),
            workers: 2,
        }
    }
}

impl SyncConfig {
    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.owner_id, "certsync");
        assert_eq!(config.sweep_interval, Duration::from_secs(21_600));
        assert_eq!(config.not_ready_requeue, Duration::from_secs(5));
        assert_eq!(config.pending_requeue, Duration::from_secs(15));
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn builder_overrides() {
        let config = SyncConfig::default()
            .with_owner_id("team-infra")
            .with_sweep_interval(Duration::from_secs(60))
            .with_workers(0);

        assert_eq!(config.owner_id, "team-infra");
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        // worker count never drops below one
        assert_eq!(config.workers, 1);
    }
}
