//! Orphan sweeper
//!
//! Eventual-consistency backstop for CA certificates whose owning intent
//! disappeared through a path that bypassed the finalizer (administrative
//! deletion of the underlying store, a crash between intent deletion and
//! engine cleanup).

use std::sync::Arc;

use certsync_acm::CertificateAuthority;
use certsync_core::{NamespacedName, SyncConfig};
use certsync_store::IntentStore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ControllerError;
use crate::{TAG_CERTIFICATE_NAME, TAG_CERTIFICATE_NAMESPACE, TAG_OWNER};

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Certificates listed at the CA.
    pub scanned: usize,
    /// Orphans deleted this sweep.
    pub deleted: usize,
}

/// Periodically deletes CA certificates tagged as owned by this system whose
/// backing intent no longer exists.
pub struct OrphanSweeper {
    acm: Arc<dyn CertificateAuthority>,
    store: Arc<dyn IntentStore>,
    config: SyncConfig,
}

impl OrphanSweeper {
    pub fn new(
        acm: Arc<dyn CertificateAuthority>,
        store: Arc<dyn IntentStore>,
        config: SyncConfig,
    ) -> Self {
        Self { acm, store, config }
    }

    /// Runs sweeps on the configured interval until cancelled. At most one
    /// sweep is in flight: a tick that fires while a sweep is still running
    /// is delayed behind it, never run concurrently.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick of an interval fires immediately; the first sweep
        // should happen one full interval after startup
        ticker.tick().await;

        info!(
            "orphan sweeper started, interval {:?}",
            self.config.sweep_interval
        );
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("orphan sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.sweep_once().await {
                Ok(report) => info!(
                    "orphan sweep finished: {} certificate(s) scanned, {} deleted",
                    report.scanned, report.deleted
                ),
                Err(err) => error!("orphan sweep failed: {}", err),
            }
        }
    }

    /// One full pass over the CA's certificates. Per-certificate failures are
    /// logged and skipped; only a failure to list at all aborts the sweep.
    pub async fn sweep_once(&self) -> Result<SweepReport, ControllerError> {
        let summaries = self.acm.list_certificates().await?;
        let mut report = SweepReport {
            scanned: summaries.len(),
            deleted: 0,
        };

        for summary in summaries {
            let tags = match self.acm.list_tags(&summary.arn).await {
                Ok(tags) => tags,
                Err(err) => {
                    warn!("unable to list tags for {}: {}", summary.arn, err);
                    continue;
                }
            };

            if tags.get(TAG_OWNER) != Some(&self.config.owner_id) {
                continue;
            }
            let (Some(namespace), Some(name)) = (
                tags.get(TAG_CERTIFICATE_NAMESPACE),
                tags.get(TAG_CERTIFICATE_NAME),
            ) else {
                continue;
            };

            let key = NamespacedName::new(namespace.clone(), name.clone());
            match self.store.get(&key).await {
                // the intent is alive: leave the certificate alone even if it
                // is not the intent's current arn, to avoid racing an
                // in-flight reconcile that may still be using it
                Ok(_) => continue,
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!("unable to look up intent {} for {}: {}", key, summary.arn, err);
                    continue;
                }
            }

            match self.acm.delete_certificate(&summary.arn).await {
                Ok(()) => {
                    info!("deleted orphaned certificate {} (intent {} gone)", summary.arn, key);
                    report.deleted += 1;
                }
                Err(err) if err.is_not_found() => {
                    report.deleted += 1;
                }
                Err(err) => {
                    warn!("unable to delete orphaned certificate {}: {}", summary.arn, err);
                }
            }
        }

        Ok(report)
    }
}
