//! Background writer that mirrors committed snapshots into a [`LayerStore`].
//!
//! A single task consumes the registry change feed, so saves happen in revision order and
//! intermediate revisions may be skipped when the writer falls behind. Stopping the writer
//! never interrupts a save in progress.

use std::sync::Arc;

use layerctl_config::{ConfigSnapshot, LayerDocument, LayerStore};
use layerctl_telemetry::Metrics;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to the running writer.
pub(crate) struct PersistenceTask {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PersistenceTask {
    /// Ask the writer to stop and wait for it. A save already in progress completes first.
    pub(crate) async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(err) = self.task.await {
            warn!(error = %err, "persistence task join failed");
        }
    }
}

/// Spawn the writer. It exits when stopped or once every sender of `updates` has been dropped.
pub(crate) fn spawn_persistence_task(
    mut updates: watch::Receiver<ConfigSnapshot>,
    store: Arc<dyn LayerStore>,
    telemetry: Metrics,
) -> PersistenceTask {
    let (stop, mut stopped) = oneshot::channel();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut stopped => {
                    debug!("persistence task stopped");
                    break;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        debug!("layer change feed closed; persistence task exiting");
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    persist_snapshot(store.as_ref(), &snapshot, &telemetry).await;
                }
            }
        }
    });
    PersistenceTask { stop, task }
}

/// Save `snapshot`, recording a failure instead of propagating it.
///
/// Returns whether the save succeeded.
pub(crate) async fn persist_snapshot(
    store: &dyn LayerStore,
    snapshot: &ConfigSnapshot,
    telemetry: &Metrics,
) -> bool {
    match store.save(&LayerDocument::from(snapshot)).await {
        Ok(()) => {
            debug!(revision = snapshot.revision, "persisted layer configuration");
            true
        }
        Err(err) => {
            telemetry.inc_persist_failure();
            warn!(
                error = %err,
                revision = snapshot.revision,
                "failed to persist layer configuration"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use layerctl_config::{ConfigError, ConfigResult, FileStore, LayerRegistry, MemoryStore};

    struct BrokenStore;

    #[async_trait]
    impl LayerStore for BrokenStore {
        async fn load(&self) -> ConfigResult<Option<LayerDocument>> {
            Ok(None)
        }

        async fn save(&self, _document: &LayerDocument) -> ConfigResult<()> {
            Err(ConfigError::Io {
                operation: "layer_store.write",
                path: "broken.json".into(),
                source: std::io::Error::other("read-only"),
            })
        }
    }

    /// File store whose saves take a while and which records how many overlap.
    struct SlowFileStore {
        inner: FileStore,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl LayerStore for SlowFileStore {
        async fn load(&self) -> ConfigResult<Option<LayerDocument>> {
            self.inner.load().await
        }

        async fn save(&self, document: &LayerDocument) -> ConfigResult<()> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(150)).await;
            let saved = self.inner.save(document).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            saved
        }
    }

    async fn wait_for_revision(store: &MemoryStore, revision: u64) -> Option<LayerDocument> {
        for _ in 0..100 {
            if let Ok(Some(document)) = store.load().await {
                if document.revision == revision {
                    return Some(document);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn committed_changes_reach_the_store() {
        let registry = LayerRegistry::new();
        let store = Arc::new(MemoryStore::new());
        let metrics = Metrics::new().expect("metrics");
        let task = spawn_persistence_task(registry.subscribe(), store.clone(), metrics.clone());

        registry.set_layer_enabled(2, false).expect("disable layer 2");
        registry.set_layer_threshold(3, 0.9).expect("threshold");

        let document = wait_for_revision(&store, 2).await.expect("revision 2 saved");
        assert!(!document.layers[&layerctl_config::LayerKey::new(2)].enabled);
        assert_eq!(
            document.layers[&layerctl_config::LayerKey::new(3)].confidence_threshold,
            0.9
        );
        assert_eq!(metrics.snapshot().config_persist_failures_total, 0);

        drop(registry);
        tokio::time::timeout(Duration::from_secs(5), task.task)
            .await
            .expect("task exits once the registry is dropped")
            .expect("join");
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_save_in_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("layers.json");
        let store = Arc::new(SlowFileStore {
            inner: FileStore::new(&path),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let registry = LayerRegistry::new();
        let metrics = Metrics::new().expect("metrics");
        let task = spawn_persistence_task(registry.subscribe(), store.clone(), metrics.clone());

        registry.set_layer_enabled(2, false).expect("disable layer 2");
        for _ in 0..100 {
            if store.in_flight.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.in_flight.load(Ordering::SeqCst), 1, "save should be running");

        let _ = registry.set_global(false);
        task.shutdown().await;
        assert_eq!(store.in_flight.load(Ordering::SeqCst), 0);
        assert!(persist_snapshot(store.as_ref(), &registry.snapshot(), &metrics).await);

        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
        let document = FileStore::new(&path)
            .load()
            .await
            .expect("stored document parses")
            .expect("document present");
        assert_eq!(document.revision, 2);
        assert!(!document.global_enabled);
        assert!(!document.layers[&layerctl_config::LayerKey::new(2)].enabled);
        assert_eq!(metrics.snapshot().config_persist_failures_total, 0);
    }

    #[tokio::test]
    async fn save_failures_are_counted_not_fatal() {
        let registry = LayerRegistry::new();
        let metrics = Metrics::new().expect("metrics");
        let ok = persist_snapshot(&BrokenStore, &registry.snapshot(), &metrics).await;
        assert!(!ok);
        assert_eq!(metrics.snapshot().config_persist_failures_total, 1);

        let store = MemoryStore::new();
        assert!(persist_snapshot(&store, &registry.snapshot(), &metrics).await);
        assert_eq!(metrics.snapshot().config_persist_failures_total, 1);
    }
}
