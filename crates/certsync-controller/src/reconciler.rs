//! Certificate reconciliation engine
//!
//! One logical state machine per certificate intent, driving it from creation
//! through issuance to deletion: finalizer admission, drift resolution against
//! the certificate authority, status persistence with compensation, DNS
//! endpoint publication and reclamation of superseded certificates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use certsync_acm::{AcmError, CaCertificateStatus, CertificateAuthority};
use certsync_core::{NamespacedName, SyncConfig};
use certsync_resources::{
    CertificateIntent, CertificateStatusType, DnsEndpoint, DnsEndpointSpec, Endpoint, ObjectMeta,
    OwnerReference, ResourceRecord,
};
use certsync_store::{DnsEndpointStore, IntentStore};
use tracing::{debug, error, info, warn};

use crate::error::ControllerError;
use crate::events::{reason, EventKind, EventRecorder};
use crate::{FINALIZER, TAG_CERTIFICATE_NAME, TAG_CERTIFICATE_NAMESPACE, TAG_OWNER};

/// Outcome of a reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Advisory scheduling hint; `None` means converged, nothing pending.
    pub requeue_after: Option<Duration>,
}

impl Reconciliation {
    pub fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }

    pub fn after(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }
}

/// Result of the superseded-certificate cleanup pass. Individual failures are
/// collected, never fatal to the pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failures: Vec<(String, AcmError)>,
}

impl CleanupReport {
    fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|(arn, err)| format!("{arn}: {err}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The per-intent reconciliation engine.
///
/// Safe to invoke repeatedly and concurrently for different keys; the work
/// queue guarantees the same key is never reconciled twice at once. Every
/// step is either a pure read or an idempotent write, so a cancelled pass
/// leaves no unrecoverable state.
pub struct CertificateReconciler {
    store: Arc<dyn IntentStore>,
    endpoints: Arc<dyn DnsEndpointStore>,
    acm: Arc<dyn CertificateAuthority>,
    recorder: Arc<dyn EventRecorder>,
    config: SyncConfig,
}

impl CertificateReconciler {
    pub fn new(
        store: Arc<dyn IntentStore>,
        endpoints: Arc<dyn DnsEndpointStore>,
        acm: Arc<dyn CertificateAuthority>,
        recorder: Arc<dyn EventRecorder>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            endpoints,
            acm,
            recorder,
            config,
        }
    }

    pub async fn reconcile(&self, key: &NamespacedName) -> Result<Reconciliation, ControllerError> {
        let mut intent = match self.store.get(key).await {
            Ok(intent) => intent,
            Err(err) if err.is_not_found() => {
                debug!("{} no longer exists, nothing to reconcile", key);
                return Ok(Reconciliation::done());
            }
            Err(err) => return Err(err.into()),
        };

        // deletion path: clean up at the CA, then release the finalizer
        if intent.metadata.is_deleting() {
            if intent.metadata.has_finalizer(FINALIZER) {
                self.delete_remote_certificate(&intent.status.certificate_arn)
                    .await?;
                intent.metadata.remove_finalizer(FINALIZER);
                self.store.update(&intent).await?;
            }
            return Ok(Reconciliation::done());
        }

        // admission: install the finalizer before anything touches the CA;
        // the persisted write retriggers reconciliation through the watch
        if !intent.metadata.has_finalizer(FINALIZER) {
            intent.metadata.add_finalizer(FINALIZER);
            self.store.update(&intent).await?;
            return Ok(Reconciliation::done());
        }

        // drift resolution against the CA
        let mut created = false;
        if intent.status.certificate_arn.is_empty() {
            if let Err(err) = self.request_certificate(&mut intent).await {
                self.record_request_failure(key, &mut intent, &err).await;
                return Err(err.into());
            }
            created = true;
        } else {
            let matches = match self.matches_desired(&intent).await {
                Ok(matches) => matches,
                Err(err) => {
                    error!("{} unable to compare certificate: {}", key, err);
                    self.recorder
                        .record(key, EventKind::Warning, reason::COMPARE_ERROR, &err.to_string());
                    return Err(err.into());
                }
            };
            if !matches {
                info!("{} drifted from its certificate, requesting a replacement", key);
                if let Err(err) = self.request_certificate(&mut intent).await {
                    self.record_request_failure(key, &mut intent, &err).await;
                    return Err(err.into());
                }
                intent.status.resource_records.clear();
                created = true;
            }
        }

        intent = self.persist_status(key, intent, created).await?;

        // pull validation metadata from the CA
        match self.refresh_certificate_info(&mut intent).await {
            Ok(true) => {}
            Ok(false) => {
                // validation records not computed yet; leave status untouched
                debug!("{} waiting for validation records", key);
                return Ok(Reconciliation::after(self.config.not_ready_requeue));
            }
            Err(err) => {
                error!("{} unable to refresh certificate info: {}", key, err);
                self.recorder
                    .record(key, EventKind::Warning, reason::UPDATE_ERROR, &err.to_string());
                if created {
                    self.compensate(key, &intent.status.certificate_arn).await;
                }
                return Err(err.into());
            }
        }

        intent = self.persist_status(key, intent, created).await?;

        // republish validation challenges for the DNS-sync agent
        if let Err(err) = self.sync_dns_endpoints(&intent).await {
            error!("{} unable to sync DNS endpoints: {}", key, err);
            self.recorder
                .record(key, EventKind::Warning, reason::UPDATE_ERROR, &err.to_string());
            return Err(err.into());
        }

        if intent.status.status != CertificateStatusType::Issued {
            return Ok(Reconciliation::after(self.config.pending_requeue));
        }
        self.recorder.record(
            key,
            EventKind::Normal,
            reason::SUCCESSFUL_SYNC,
            "certificate sync succeeded",
        );

        // reclaim superseded certificates still attributed to this intent
        match self.cleanup_superseded(&intent).await {
            Ok(report) => {
                if !report.failures.is_empty() {
                    let message = report.failure_summary();
                    warn!(
                        "{} cleanup left {} certificate(s) behind: {}",
                        key,
                        report.failures.len(),
                        message
                    );
                    self.recorder
                        .record(key, EventKind::Warning, reason::CLEANUP_ERROR, &message);
                    return Ok(Reconciliation::after(self.config.not_ready_requeue));
                }
                if report.deleted > 0 {
                    self.recorder.record(
                        key,
                        EventKind::Normal,
                        reason::SUCCESSFUL_CLEANUP,
                        &format!("{} certificate(s) cleaned up", report.deleted),
                    );
                }
                Ok(Reconciliation::done())
            }
            Err(err) => {
                error!("{} unable to clean up old certificates: {}", key, err);
                self.recorder
                    .record(key, EventKind::Warning, reason::CLEANUP_ERROR, &err.to_string());
                Ok(Reconciliation::after(self.config.not_ready_requeue))
            }
        }
    }

    /// Requests a new certificate tagged with the ownership triple and binds
    /// its arn to the intent.
    async fn request_certificate(&self, intent: &mut CertificateIntent) -> Result<(), AcmError> {
        let tags = HashMap::from([
            (TAG_OWNER.to_string(), self.config.owner_id.clone()),
            (
                TAG_CERTIFICATE_NAMESPACE.to_string(),
                intent.metadata.namespace.clone(),
            ),
            (
                TAG_CERTIFICATE_NAME.to_string(),
                intent.metadata.name.clone(),
            ),
        ]);
        let arn = self
            .acm
            .request_certificate(
                &intent.spec.common_name,
                &intent.spec.subject_alternative_names,
                &tags,
            )
            .await?;
        info!(
            "requested certificate {} for {}",
            arn,
            intent.metadata.namespaced_name()
        );
        intent.status.certificate_arn = arn;
        intent.status.status = CertificateStatusType::Requested;
        Ok(())
    }

    async fn record_request_failure(
        &self,
        key: &NamespacedName,
        intent: &mut CertificateIntent,
        err: &AcmError,
    ) {
        error!("{} unable to request certificate: {}", key, err);
        self.recorder
            .record(key, EventKind::Warning, reason::REQUEST_ERROR, &err.to_string());
        intent.status.status = CertificateStatusType::Error;
        if let Err(persist_err) = self.store.update_status(intent).await {
            error!("{} unable to persist Error status: {}", key, persist_err);
        }
    }

    /// Whether the bound certificate still matches the desired identity.
    /// A certificate the CA no longer knows counts as a mismatch.
    async fn matches_desired(&self, intent: &CertificateIntent) -> Result<bool, AcmError> {
        let detail = match self
            .acm
            .describe_certificate(&intent.status.certificate_arn)
            .await
        {
            Ok(detail) => detail,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };

        if detail.domain_name != intent.spec.common_name {
            return Ok(false);
        }
        let observed: HashSet<&str> = detail
            .subject_alternative_names
            .iter()
            .map(String::as_str)
            .collect();
        Ok(intent.spec.san_set() == observed)
    }

    /// Copies validation records, validity window and status from the CA into
    /// the intent. Returns `Ok(false)` while any validation record is still
    /// being computed, leaving the intent untouched.
    async fn refresh_certificate_info(
        &self,
        intent: &mut CertificateIntent,
    ) -> Result<bool, AcmError> {
        let detail = self
            .acm
            .describe_certificate(&intent.status.certificate_arn)
            .await?;
        if !detail.validation_records_ready() {
            return Ok(false);
        }

        intent.status.resource_records = detail
            .validation_options
            .iter()
            .filter_map(|option| option.resource_record.as_ref())
            .map(|record| ResourceRecord {
                name: record.name.clone(),
                record_type: record.record_type.clone(),
                value: record.value.clone(),
            })
            .collect();
        intent.status.not_before = detail.not_before;
        intent.status.not_after = detail.not_after;
        intent.status.status = status_from_ca(detail.status);
        Ok(true)
    }

    /// Persists the status subresource. If this pass created a brand-new
    /// certificate and the persist fails, the certificate is deleted again so
    /// no unreferenced CA resource leaks.
    async fn persist_status(
        &self,
        key: &NamespacedName,
        intent: CertificateIntent,
        created: bool,
    ) -> Result<CertificateIntent, ControllerError> {
        match self.store.update_status(&intent).await {
            Ok(updated) => Ok(updated),
            Err(err) => {
                error!("{} unable to persist status: {}", key, err);
                self.recorder
                    .record(key, EventKind::Warning, reason::UPDATE_ERROR, &err.to_string());
                if created {
                    self.compensate(key, &intent.status.certificate_arn).await;
                }
                Err(err.into())
            }
        }
    }

    async fn compensate(&self, key: &NamespacedName, arn: &str) {
        warn!("{} rolling back just-requested certificate {}", key, arn);
        if let Err(err) = self.delete_remote_certificate(arn).await {
            // accepted as a rare manual-cleanup case
            error!("{} compensating delete of {} failed: {}", key, arn, err);
        }
    }

    /// Deletes a certificate at the CA; an empty arn or a typed not-found
    /// response counts as success.
    async fn delete_remote_certificate(&self, arn: &str) -> Result<(), AcmError> {
        if arn.is_empty() {
            return Ok(());
        }
        match self.acm.delete_certificate(arn).await {
            Ok(()) => {
                info!("deleted certificate {} at the certificate authority", arn);
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Upserts the DNS endpoint object derived from the validation records,
    /// owned by the intent.
    async fn sync_dns_endpoints(&self, intent: &CertificateIntent) -> Result<(), certsync_store::StoreError> {
        let key = intent.metadata.namespaced_name();
        let records: Vec<Endpoint> = intent.status.resource_records.iter().map(Endpoint::from).collect();

        match self.endpoints.get(&key).await {
            Ok(mut existing) => {
                existing.spec.endpoints = records;
                self.endpoints.update(&existing).await?;
            }
            Err(err) if err.is_not_found() => {
                let mut endpoint = DnsEndpoint {
                    metadata: ObjectMeta::new(
                        intent.metadata.namespace.clone(),
                        intent.metadata.name.clone(),
                    ),
                    spec: DnsEndpointSpec { endpoints: records },
                };
                endpoint.metadata.owner_references.push(OwnerReference {
                    kind: "CertificateIntent".to_string(),
                    name: intent.metadata.name.clone(),
                    uid: intent.metadata.uid.clone(),
                });
                self.endpoints.create(endpoint).await?;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Deletes every certificate other than the active one whose tag triple
    /// attributes it to this intent. Failures are collected, not fatal.
    async fn cleanup_superseded(
        &self,
        intent: &CertificateIntent,
    ) -> Result<CleanupReport, AcmError> {
        let mut report = CleanupReport::default();
        for summary in self.acm.list_certificates().await? {
            if summary.arn == intent.status.certificate_arn {
                continue;
            }
            let tags = match self.acm.list_tags(&summary.arn).await {
                Ok(tags) => tags,
                Err(err) => {
                    report.failures.push((summary.arn.clone(), err));
                    continue;
                }
            };
            if !self.owns(&tags, &intent.metadata) {
                continue;
            }
            match self.delete_remote_certificate(&summary.arn).await {
                Ok(()) => report.deleted += 1,
                Err(err) => report.failures.push((summary.arn.clone(), err)),
            }
        }
        Ok(report)
    }

    fn owns(&self, tags: &HashMap<String, String>, meta: &ObjectMeta) -> bool {
        tags.get(TAG_OWNER)
            .is_some_and(|owner| *owner == self.config.owner_id)
            && tags
                .get(TAG_CERTIFICATE_NAMESPACE)
                .is_some_and(|namespace| *namespace == meta.namespace)
            && tags
                .get(TAG_CERTIFICATE_NAME)
                .is_some_and(|name| *name == meta.name)
    }
}

fn status_from_ca(status: CaCertificateStatus) -> CertificateStatusType {
    match status {
        CaCertificateStatus::PendingValidation => CertificateStatusType::PendingValidation,
        CaCertificateStatus::Issued => CertificateStatusType::Issued,
        CaCertificateStatus::Inactive => CertificateStatusType::Inactive,
        CaCertificateStatus::Expired => CertificateStatusType::Expired,
        CaCertificateStatus::ValidationTimedOut => CertificateStatusType::ValidationTimedOut,
        CaCertificateStatus::Revoked => CertificateStatusType::Revoked,
        CaCertificateStatus::Failed => CertificateStatusType::Failed,
        CaCertificateStatus::Unknown => CertificateStatusType::Unknown,
    }
}
