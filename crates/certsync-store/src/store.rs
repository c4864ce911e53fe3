//! Store capability interfaces and watch events

use async_trait::async_trait;
use certsync_core::NamespacedName;
use certsync_resources::{CertificateIntent, DnsEndpoint};
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::StoreError;

/// Change notification delivered to watchers.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The object was created or updated (level-triggered; carries the new
    /// state).
    Applied(CertificateIntent),
    /// The object was removed from the store.
    Deleted(CertificateIntent),
}

impl WatchEvent {
    pub fn key(&self) -> NamespacedName {
        match self {
            WatchEvent::Applied(intent) | WatchEvent::Deleted(intent) => {
                intent.metadata.namespaced_name()
            }
        }
    }
}

/// Subscription to intent change events, optionally scoped to one namespace.
pub struct IntentWatch {
    receiver: broadcast::Receiver<WatchEvent>,
    namespace: Option<String>,
}

impl IntentWatch {
    pub fn new(receiver: broadcast::Receiver<WatchEvent>, namespace: Option<String>) -> Self {
        Self {
            receiver,
            namespace,
        }
    }

    /// Receives the next matching event. Returns `None` once the store side
    /// of the channel is closed. A lagged subscription is logged and resumed;
    /// level-triggered reconciliation tolerates dropped intermediate events.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(namespace) = &self.namespace {
                        if event.key().namespace != *namespace {
                            continue;
                        }
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("intent watch lagged, skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Declarative store of certificate intents.
///
/// Spec/metadata writes and status writes are independent channels: `update`
/// is conditional on the object's resource version, while `update_status`
/// performs a forced server-side merge of the status subresource under the
/// [`crate::FIELD_MANAGER`] identity.
#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn get(&self, key: &NamespacedName) -> Result<CertificateIntent, StoreError>;

    async fn create(&self, intent: CertificateIntent) -> Result<CertificateIntent, StoreError>;

    /// Conditional write of spec and metadata; fails with
    /// [`StoreError::Conflict`] on a resource-version mismatch.
    async fn update(&self, intent: &CertificateIntent) -> Result<CertificateIntent, StoreError>;

    /// Forced last-writer-wins merge of the status subresource.
    async fn update_status(
        &self,
        intent: &CertificateIntent,
    ) -> Result<CertificateIntent, StoreError>;

    /// Marks the object for deletion. Removal is blocked until every
    /// finalizer has been cleared.
    async fn delete(&self, key: &NamespacedName) -> Result<(), StoreError>;

    async fn watch(&self, namespace: Option<&str>) -> Result<IntentWatch, StoreError>;
}

/// Store of DNS endpoint objects published for the external DNS-sync agent,
/// keyed by the owning intent's identity.
#[async_trait]
pub trait DnsEndpointStore: Send + Sync {
    async fn get(&self, key: &NamespacedName) -> Result<DnsEndpoint, StoreError>;

    async fn create(&self, endpoint: DnsEndpoint) -> Result<DnsEndpoint, StoreError>;

    async fn update(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, StoreError>;
}
