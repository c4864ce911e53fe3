//! In-memory store with the external store's concurrency semantics
//!
//! Backs the controller tests: conditional writes are checked against the
//! stored resource version, status updates are forced merges, and deletion is
//! blocked by finalizers exactly like the real store.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use certsync_core::NamespacedName;
use certsync_resources::{CertificateIntent, DnsEndpoint};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{DnsEndpointStore, IntentStore, IntentWatch, WatchEvent};

#[derive(Default)]
struct MemoryState {
    intents: HashMap<NamespacedName, CertificateIntent>,
    endpoints: HashMap<NamespacedName, DnsEndpoint>,
    fail_update: VecDeque<StoreError>,
    fail_status_update: VecDeque<StoreError>,
}

/// In-memory implementation of both store interfaces.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(MemoryState::default()),
            events,
        }
    }

    /// Makes the next conditional spec/metadata write fail.
    pub async fn fail_next_update(&self, err: StoreError) {
        self.state.write().await.fail_update.push_back(err);
    }

    /// Makes the next status write fail.
    pub async fn fail_next_status_update(&self, err: StoreError) {
        self.state.write().await.fail_status_update.push_back(err);
    }

    pub async fn intent_count(&self) -> usize {
        self.state.read().await.intents.len()
    }

    pub async fn endpoint(&self, key: &NamespacedName) -> Option<DnsEndpoint> {
        self.state.read().await.endpoints.get(key).cloned()
    }

    fn emit(&self, event: WatchEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IntentStore for MemoryStore {
    async fn get(&self, key: &NamespacedName) -> Result<CertificateIntent, StoreError> {
        self.state
            .read()
            .await
            .intents
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn create(&self, mut intent: CertificateIntent) -> Result<CertificateIntent, StoreError> {
        let key = intent.metadata.namespaced_name();
        let mut state = self.state.write().await;
        if state.intents.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        intent.metadata.uid = Some(Uuid::new_v4().to_string());
        intent.metadata.resource_version = 1;
        state.intents.insert(key, intent.clone());
        drop(state);
        self.emit(WatchEvent::Applied(intent.clone()));
        Ok(intent)
    }

    async fn update(&self, intent: &CertificateIntent) -> Result<CertificateIntent, StoreError> {
        let key = intent.metadata.namespaced_name();
        let mut state = self.state.write().await;
        if let Some(err) = state.fail_update.pop_front() {
            return Err(err);
        }
        let stored = state
            .intents
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if stored.metadata.resource_version != intent.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "{}: resource version {} is stale",
                key, intent.metadata.resource_version
            )));
        }

        let mut updated = intent.clone();
        updated.metadata.resource_version += 1;

        // clearing the last finalizer of a deleting object removes it
        if updated.metadata.is_deleting() && updated.metadata.finalizers.is_empty() {
            state.intents.remove(&key);
            drop(state);
            self.emit(WatchEvent::Deleted(updated.clone()));
            return Ok(updated);
        }

        state.intents.insert(key, updated.clone());
        drop(state);
        self.emit(WatchEvent::Applied(updated.clone()));
        Ok(updated)
    }

    async fn update_status(
        &self,
        intent: &CertificateIntent,
    ) -> Result<CertificateIntent, StoreError> {
        let key = intent.metadata.namespaced_name();
        let mut state = self.state.write().await;
        if let Some(err) = state.fail_status_update.pop_front() {
            return Err(err);
        }
        let stored = state
            .intents
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        // forced merge of the status subresource, last writer wins
        stored.status = intent.status.clone();
        stored.metadata.resource_version += 1;
        let updated = stored.clone();
        drop(state);
        self.emit(WatchEvent::Applied(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, key: &NamespacedName) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut stored = state
            .intents
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if stored.metadata.finalizers.is_empty() {
            drop(state);
            self.emit(WatchEvent::Deleted(stored));
            return Ok(());
        }

        // finalizers pending: mark for deletion and wait for them to clear
        if stored.metadata.deletion_timestamp.is_none() {
            stored.metadata.deletion_timestamp = Some(chrono::Utc::now());
        }
        stored.metadata.resource_version += 1;
        state.intents.insert(key.clone(), stored.clone());
        drop(state);
        self.emit(WatchEvent::Applied(stored));
        Ok(())
    }

    async fn watch(&self, namespace: Option<&str>) -> Result<IntentWatch, StoreError> {
        Ok(IntentWatch::new(
            self.events.subscribe(),
            namespace.map(str::to_string),
        ))
    }
}

#[async_trait]
impl DnsEndpointStore for MemoryStore {
    async fn get(&self, key: &NamespacedName) -> Result<DnsEndpoint, StoreError> {
        self.state
            .read()
            .await
            .endpoints
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn create(&self, mut endpoint: DnsEndpoint) -> Result<DnsEndpoint, StoreError> {
        let key = endpoint.metadata.namespaced_name();
        let mut state = self.state.write().await;
        if state.endpoints.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        endpoint.metadata.uid = Some(Uuid::new_v4().to_string());
        endpoint.metadata.resource_version = 1;
        state.endpoints.insert(key, endpoint.clone());
        Ok(endpoint)
    }

    async fn update(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, StoreError> {
        let key = endpoint.metadata.namespaced_name();
        let mut state = self.state.write().await;
        let stored = state
            .endpoints
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if stored.metadata.resource_version != endpoint.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "{}: resource version {} is stale",
                key, endpoint.metadata.resource_version
            )));
        }
        let mut updated = endpoint.clone();
        updated.metadata.resource_version += 1;
        state.endpoints.insert(key, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsync_resources::CertificateSpec;

    fn intent(name: &str) -> CertificateIntent {
        CertificateIntent::new(
            "default",
            name,
            CertificateSpec {
                common_name: format!("{name}.example.com"),
                subject_alternative_names: vec![format!("{name}.example.com")],
            },
        )
    }

    #[tokio::test]
    async fn stale_update_is_rejected() {
        let store = MemoryStore::new();
        let created = IntentStore::create(&store, intent("a")).await.unwrap();

        // first writer wins
        let updated = IntentStore::update(&store, &created).await.unwrap();
        assert_eq!(updated.metadata.resource_version, 2);

        // second writer still holds version 1
        let err = IntentStore::update(&store, &created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn status_update_is_forced_merge() {
        let store = MemoryStore::new();
        let mut created = IntentStore::create(&store, intent("a")).await.unwrap();

        created.status.certificate_arn = "arn-1".to_string();
        // stale resource version does not matter on the status channel
        created.metadata.resource_version = 0;
        let updated = store.update_status(&created).await.unwrap();
        assert_eq!(updated.status.certificate_arn, "arn-1");
        assert_eq!(updated.metadata.resource_version, 2);
    }

    #[tokio::test]
    async fn delete_blocks_on_finalizers() {
        let store = MemoryStore::new();
        let mut created = IntentStore::create(&store, intent("a")).await.unwrap();
        created.metadata.add_finalizer("certsync.io/finalizer");
        let mut stored = IntentStore::update(&store, &created).await.unwrap();

        let key = stored.metadata.namespaced_name();
        store.delete(&key).await.unwrap();

        // still present, marked for deletion
        stored = IntentStore::get(&store, &key).await.unwrap();
        assert!(stored.metadata.is_deleting());

        // clearing the finalizer releases the object
        stored.metadata.remove_finalizer("certsync.io/finalizer");
        IntentStore::update(&store, &stored).await.unwrap();
        assert!(IntentStore::get(&store, &key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn endpoint_upsert_round_trip() {
        use certsync_resources::{DnsEndpointSpec, Endpoint, ObjectMeta};

        let store = MemoryStore::new();
        let key = NamespacedName::new("default", "a");
        let endpoint = DnsEndpoint {
            metadata: ObjectMeta::new("default", "a"),
            spec: DnsEndpointSpec {
                endpoints: vec![Endpoint::new("_abc.example.com", "CNAME", "target.example")],
            },
        };

        let created = DnsEndpointStore::create(&store, endpoint).await.unwrap();
        assert_eq!(created.metadata.resource_version, 1);

        let mut fetched = DnsEndpointStore::get(&store, &key).await.unwrap();
        fetched.spec.endpoints = vec![Endpoint::new("_def.example.com", "CNAME", "other.example")];
        let updated = DnsEndpointStore::update(&store, &fetched).await.unwrap();
        assert_eq!(updated.metadata.resource_version, 2);
        assert_eq!(
            DnsEndpointStore::get(&store, &key)
                .await
                .unwrap()
                .spec
                .endpoints[0]
                .dns_name,
            "_def.example.com"
        );
    }

    #[tokio::test]
    async fn watch_filters_by_namespace() {
        let store = MemoryStore::new();
        let mut watch_default = store.watch(Some("default")).await.unwrap();
        let mut watch_all = store.watch(None).await.unwrap();

        let mut other = intent("b");
        other.metadata.namespace = "other".to_string();
        IntentStore::create(&store, other).await.unwrap();
        IntentStore::create(&store, intent("a")).await.unwrap();

        // the namespaced watch only sees default/a
        let event = watch_default.recv().await.unwrap();
        assert_eq!(event.key(), NamespacedName::new("default", "a"));

        // the unscoped watch sees both
        let event = watch_all.recv().await.unwrap();
        assert_eq!(event.key(), NamespacedName::new("other", "b"));
        let event = watch_all.recv().await.unwrap();
        assert_eq!(event.key(), NamespacedName::new("default", "a"));
    }
}
