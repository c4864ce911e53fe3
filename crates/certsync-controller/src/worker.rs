//! Keyed work queue and reconcile worker pool
//!
//! Level-triggered delivery: watch events and self-requeues enqueue keys, a
//! fixed pool of workers drains them. A queued key is never duplicated and a
//! key being reconciled is never handed to a second worker; re-delivery of an
//! in-flight key parks it for one more pass after the current one finishes.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use certsync_core::{NamespacedName, SyncConfig};
use certsync_store::IntentWatch;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::reconciler::CertificateReconciler;

#[derive(Default)]
struct QueueState {
    queue: VecDeque<NamespacedName>,
    queued: HashSet<NamespacedName>,
    active: HashSet<NamespacedName>,
    parked: HashSet<NamespacedName>,
}

/// Deduplicating keyed queue enforcing single-writer-per-resource delivery.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a key. Already-queued and parked keys deduplicate; a key
    /// currently being reconciled is parked for re-dispatch once the
    /// in-flight pass finishes.
    pub fn add(&self, key: NamespacedName) {
        let mut state = self.state.lock().unwrap();
        if state.queued.contains(&key) || state.parked.contains(&key) {
            return;
        }
        if state.active.contains(&key) {
            state.parked.insert(key);
            return;
        }
        state.queued.insert(key.clone());
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Waits for the next dispatchable key and marks it in-flight.
    pub async fn next(&self) -> NamespacedName {
        loop {
            let notified = self.notify.notified();
            if let Some(key) = self.try_next() {
                return key;
            }
            notified.await;
        }
    }

    fn try_next(&self) -> Option<NamespacedName> {
        let mut state = self.state.lock().unwrap();
        let key = state.queue.pop_front()?;
        state.queued.remove(&key);
        state.active.insert(key.clone());
        Some(key)
    }

    /// Marks an in-flight key finished; a parked re-delivery goes straight
    /// back into the queue.
    pub fn done(&self, key: &NamespacedName) {
        let mut state = self.state.lock().unwrap();
        state.active.remove(key);
        if state.parked.remove(key) {
            state.queued.insert(key.clone());
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives the reconciliation engine from a watch stream with a worker pool.
pub struct Controller {
    reconciler: Arc<CertificateReconciler>,
    queue: Arc<WorkQueue>,
    config: SyncConfig,
}

impl Controller {
    pub fn new(reconciler: Arc<CertificateReconciler>, config: SyncConfig) -> Self {
        Self {
            reconciler,
            queue: Arc::new(WorkQueue::new()),
            config,
        }
    }

    /// Handle for enqueueing keys from outside the watch stream.
    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    /// Pumps watch events into the queue and runs the worker pool until the
    /// token is cancelled or the watch closes.
    pub async fn run(&self, mut watch: IntentWatch, token: CancellationToken) {
        let mut workers = Vec::new();
        for worker_id in 0..self.config.workers.max(1) {
            workers.push(tokio::spawn(Self::worker(
                worker_id,
                self.reconciler.clone(),
                self.queue.clone(),
                self.config.clone(),
                token.clone(),
            )));
        }

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = watch.recv() => match event {
                    Some(event) => self.queue.add(event.key()),
                    None => {
                        warn!("intent watch closed, shutting down controller");
                        break;
                    }
                },
            }
        }

        token.cancel();
        for worker in workers {
            if let Err(err) = worker.await {
                error!("reconcile worker panicked: {}", err);
            }
        }
    }

    async fn worker(
        worker_id: usize,
        reconciler: Arc<CertificateReconciler>,
        queue: Arc<WorkQueue>,
        config: SyncConfig,
        token: CancellationToken,
    ) {
        debug!("reconcile worker {} started", worker_id);
        loop {
            let key = tokio::select! {
                _ = token.cancelled() => break,
                key = queue.next() => key,
            };

            let outcome = reconciler.reconcile(&key).await;
            queue.done(&key);

            let delay = match outcome {
                Ok(result) => result.requeue_after,
                Err(err) => {
                    error!("reconcile of {} failed: {}", key, err);
                    // caller-side backoff: retry after the short delay
                    Some(config.not_ready_requeue)
                }
            };
            if let Some(delay) = delay {
                let queue = queue.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => queue.add(key),
                    }
                });
            }
        }
        debug!("reconcile worker {} stopped", worker_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn key(name: &str) -> NamespacedName {
        NamespacedName::new("default", name)
    }

    #[tokio::test]
    async fn queued_keys_deduplicate() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        queue.add(key("a"));
        queue.add(key("b"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.next().await, key("a"));
        assert_eq!(queue.next().await, key("b"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn in_flight_key_is_parked_not_duplicated() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        let active = queue.next().await;
        assert_eq!(active, key("a"));

        // re-delivered while in flight: parked, not queued
        queue.add(key("a"));
        queue.add(key("a"));
        assert!(queue.is_empty());

        // finishing the pass re-dispatches exactly one copy
        queue.done(&active);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next().await, key("a"));
        queue.done(&key("a"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn next_wakes_up_on_add() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };

        // give the waiter a chance to park
        tokio::task::yield_now().await;
        queue.add(key("a"));

        let got = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake up")
            .unwrap();
        assert_eq!(got, key("a"));
    }

    #[tokio::test]
    async fn distinct_keys_dispatch_to_concurrent_workers() {
        let queue = Arc::new(WorkQueue::new());
        queue.add(key("a"));
        queue.add(key("b"));

        let first = queue.next().await;
        let second = queue.next().await;
        assert_ne!(first, second);

        // both are in flight; neither can be dispatched again
        queue.add(first.clone());
        queue.add(second.clone());
        assert!(queue.is_empty());
    }
}
