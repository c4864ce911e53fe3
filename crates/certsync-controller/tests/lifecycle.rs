//! End-to-end controller lifecycle against the in-memory store and mock CA

use std::sync::Arc;
use std::time::Duration;

use certsync_acm::test_utils::MockCertificateAuthority;
use certsync_acm::CaCertificateStatus;
use certsync_controller::events::test_utils::MemoryEventRecorder;
use certsync_controller::{CertificateReconciler, Controller};
use certsync_core::{NamespacedName, SyncConfig};
use certsync_resources::{CertificateIntent, CertificateSpec, CertificateStatusType};
use certsync_store::test_utils::MemoryStore;
use certsync_store::IntentStore;
use tokio_util::sync::CancellationToken;

struct Harness {
    store: Arc<MemoryStore>,
    ca: Arc<MockCertificateAuthority>,
    token: CancellationToken,
    run: tokio::task::JoinHandle<()>,
}

async fn start_controller() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let ca = Arc::new(MockCertificateAuthority::new());
    let recorder = Arc::new(MemoryEventRecorder::new());
    ca.set_records_ready(true).await;
    ca.set_new_certificate_status(CaCertificateStatus::Issued).await;

    let config = SyncConfig::default();
    let reconciler = Arc::new(CertificateReconciler::new(
        store.clone(),
        store.clone(),
        ca.clone(),
        recorder,
        config.clone(),
    ));
    let controller = Controller::new(reconciler, config);

    let watch = store.watch(None).await.unwrap();
    let token = CancellationToken::new();
    let run = {
        let token = token.clone();
        tokio::spawn(async move { controller.run(watch, token).await })
    };

    Harness {
        store,
        ca,
        token,
        run,
    }
}

async fn create_intent(store: &MemoryStore, name: &str, domain: &str) -> NamespacedName {
    let intent = CertificateIntent::new(
        "default",
        name,
        CertificateSpec {
            common_name: domain.to_string(),
            subject_alternative_names: vec![domain.to_string()],
        },
    );
    IntentStore::create(store, intent).await.unwrap();
    NamespacedName::new("default", name)
}

async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn controller_converges_new_intent_to_issued() {
    let harness = start_controller().await;
    let key = create_intent(&harness.store, "site", "site.example.com").await;

    wait_until("intent to reach Issued with its endpoint", || {
        let store = harness.store.clone();
        let key = key.clone();
        async move {
            let issued = match IntentStore::get(&*store, &key).await {
                Ok(stored) => stored.status.status == CertificateStatusType::Issued,
                Err(_) => false,
            };
            issued && store.endpoint(&key).await.is_some()
        }
    })
    .await;

    let stored = IntentStore::get(&*harness.store, &key).await.unwrap();
    assert_eq!(stored.status.certificate_arn, "arn-1");
    assert_eq!(stored.status.resource_records.len(), 1);
    assert!(harness.store.endpoint(&key).await.is_some());
    assert_eq!(harness.ca.request_count().await, 1);

    harness.token.cancel();
    harness.run.await.unwrap();
}

#[tokio::test]
async fn controller_tears_down_deleted_intent() {
    let harness = start_controller().await;
    let key = create_intent(&harness.store, "site", "site.example.com").await;

    wait_until("intent to reach Issued", || {
        let store = harness.store.clone();
        let key = key.clone();
        async move {
            match IntentStore::get(&*store, &key).await {
                Ok(stored) => stored.status.status == CertificateStatusType::Issued,
                Err(_) => false,
            }
        }
    })
    .await;

    IntentStore::delete(&*harness.store, &key).await.unwrap();

    wait_until("intent to be removed", || {
        let store = harness.store.clone();
        let key = key.clone();
        async move {
            matches!(IntentStore::get(&*store, &key).await, Err(err) if err.is_not_found())
        }
    })
    .await;

    assert_eq!(harness.ca.certificate_count().await, 0);
    assert_eq!(harness.ca.delete_log().await, vec!["arn-1"]);

    harness.token.cancel();
    harness.run.await.unwrap();
}
