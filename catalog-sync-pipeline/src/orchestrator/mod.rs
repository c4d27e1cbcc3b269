//! Orchestrator module for the catalog sync pipeline.
//!
//! Consumes the primary store's after-commit change events and routes them:
//! entity writes go to the synchronizer, views become delayed trending jobs.
//! Also owns the trending workers and the queue snapshot lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::errors::PipelineError;
use crate::loader::{IndexSynchronizer, SyncOutcome};
use crate::queue::JobQueue;
use crate::trending::{TrendingEvaluator, TrendingJob};
use catalog_sync_store::ChangeEvent;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Concurrent trending workers.
    pub workers: usize,
    /// Pending trending jobs are restored from here on start and saved
    /// here on shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            snapshot_path: None,
        }
    }
}

/// Where a change event was sent.
#[derive(Debug)]
pub enum Routed {
    /// Background index sync; the handle may be dropped.
    Sync(JoinHandle<SyncOutcome>),
    /// Trending job enqueued with this id.
    Trending(u64),
}

/// Coordinates the synchronizer, the trending queue and its workers.
pub struct Orchestrator {
    synchronizer: Arc<IndexSynchronizer>,
    evaluator: Arc<TrendingEvaluator>,
    queue: Arc<JobQueue<TrendingJob>>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Orchestrator {
    pub fn new(
        synchronizer: Arc<IndexSynchronizer>,
        evaluator: Arc<TrendingEvaluator>,
        queue: Arc<JobQueue<TrendingJob>>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            synchronizer,
            evaluator,
            queue,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn queue(&self) -> Arc<JobQueue<TrendingJob>> {
        Arc::clone(&self.queue)
    }

    /// Sender that stops `run` when signalled. Signals sent before `run`
    /// starts are not lost.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Route one change event.
    pub async fn handle_event(&self, event: ChangeEvent) -> Routed {
        debug!(event = ?event, "Routing change event");
        match event {
            ChangeEvent::Upserted { kind, id } | ChangeEvent::SoftDeleted { kind, id } => {
                Routed::Sync(self.synchronizer.spawn_sync(kind, id))
            }
            ChangeEvent::Removed { kind, id } => {
                Routed::Sync(self.synchronizer.spawn_delete(kind, id))
            }
            ChangeEvent::Viewed { kind, id } => {
                Routed::Trending(self.queue.add(TrendingJob::new(kind, id)).await)
            }
        }
    }

    /// Run until the event stream ends, a shutdown signal arrives, or
    /// Ctrl-C.
    ///
    /// Running jobs finish before this returns; jobs still waiting are
    /// written to the snapshot file when one is configured.
    #[instrument(skip_all, fields(workers = self.config.workers))]
    pub async fn run(mut self, mut events: mpsc::Receiver<ChangeEvent>) -> Result<(), PipelineError> {
        info!("Starting catalog sync orchestrator");

        if let Some(path) = &self.config.snapshot_path {
            self.queue.load_snapshot(path).await?;
        }

        let queue = Arc::clone(&self.queue);
        let evaluator = Arc::clone(&self.evaluator);
        let workers = self.config.workers;
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker_handle = tokio::spawn(async move {
            queue.process(evaluator, workers, stop_rx).await;
        });

        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            };

            match event {
                Some(event) => {
                    self.handle_event(event).await;
                }
                None => {
                    info!("Change event stream ended");
                    break;
                }
            }
        }

        let _ = stop_tx.send(true);
        if let Err(e) = worker_handle.await {
            error!(error = %e, "Trending workers panicked");
        }

        if let Some(path) = &self.config.snapshot_path {
            self.queue.save_snapshot(path).await?;
        }

        let stats = self.queue.stats();
        info!(
            run = stats.run,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Backoff, JobOptions};
    use crate::testing::{listing, thread, Harness};
    use crate::trending::{TrendingConfig, TRENDING_QUEUE};
    use catalog_sync_shared::EntityKind;
    use catalog_sync_store::PrimaryStore;
    use uuid::Uuid;

    fn debounced() -> JobOptions {
        JobOptions {
            delay_ms: 30_000,
            attempts: 3,
            backoff: Backoff::Exponential { base_ms: 1000 },
        }
    }

    fn orchestrator(harness: &Harness, config: OrchestratorConfig) -> Orchestrator {
        let evaluator = TrendingEvaluator::new(harness.dyn_store(), TrendingConfig::default())
            .with_synchronizer(harness.synchronizer.clone());
        Orchestrator::new(
            harness.synchronizer.clone(),
            Arc::new(evaluator),
            Arc::new(JobQueue::new(TRENDING_QUEUE, debounced())),
            config,
        )
    }

    #[tokio::test]
    async fn test_entity_writes_route_to_synchronizer() {
        let harness = Harness::new();
        let entity = listing(0);
        let id = entity.id();
        harness.seed([entity]).await;
        let orchestrator = orchestrator(&harness, OrchestratorConfig::default());

        let Routed::Sync(handle) = orchestrator
            .handle_event(ChangeEvent::Upserted {
                kind: EntityKind::Listing,
                id,
            })
            .await
        else {
            panic!("upsert should route to the synchronizer");
        };
        assert_eq!(handle.await.unwrap(), SyncOutcome::Synced);
        assert_eq!(harness.index.len(EntityKind::Listing).await, 1);

        harness.store.remove(EntityKind::Listing, id).await.unwrap();
        let Routed::Sync(handle) = orchestrator
            .handle_event(ChangeEvent::Removed {
                kind: EntityKind::Listing,
                id,
            })
            .await
        else {
            panic!("removal should route to the synchronizer");
        };
        assert_eq!(handle.await.unwrap(), SyncOutcome::Deleted);
        assert_eq!(harness.index.len(EntityKind::Listing).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_views_enqueue_debounced_trending_jobs() {
        let harness = Harness::new();
        let entity = thread(15);
        let id = entity.id();
        harness.seed([entity]).await;
        harness.synchronizer.sync_by_id(EntityKind::Thread, id).await;
        let orchestrator = orchestrator(&harness, OrchestratorConfig::default());
        let queue = orchestrator.queue();

        for _ in 0..3 {
            let routed = orchestrator
                .handle_event(ChangeEvent::Viewed {
                    kind: EntityKind::Thread,
                    id,
                })
                .await;
            assert!(matches!(routed, Routed::Trending(_)));
        }
        assert_eq!(queue.pending().await, 3);

        let started = tokio::time::Instant::now();
        queue
            .run_until_idle(orchestrator.evaluator.clone(), 2)
            .await;

        assert!(started.elapsed() >= std::time::Duration::from_millis(30_000));
        assert_eq!(queue.stats().succeeded, 3);
        assert!(harness
            .store
            .get(EntityKind::Thread, id)
            .await
            .unwrap()
            .unwrap()
            .is_trending());
        let stored = harness
            .index
            .document(EntityKind::Thread, &id.to_string())
            .await
            .unwrap();
        assert_eq!(stored["isTrending"], true);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let harness = Harness::new();
        let orchestrator = orchestrator(&harness, OrchestratorConfig::default());
        let (_tx, rx) = mpsc::channel(8);

        orchestrator.shutdown_handle().send(()).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), orchestrator.run(rx))
            .await
            .expect("orchestrator should stop on a signal sent before run")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stream_end_stops_workers_spawned_late() {
        let harness = Harness::new();
        let config = OrchestratorConfig {
            workers: 8,
            snapshot_path: None,
        };

        for _ in 0..20 {
            let (tx, rx) = mpsc::channel(8);
            drop(tx);
            tokio::time::timeout(
                std::time::Duration::from_secs(5),
                orchestrator(&harness, config.clone()).run(rx),
            )
            .await
            .expect("workers should stop once the stream ends")
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_pending_jobs_survive_restart() {
        let harness = Harness::new();
        let path = std::env::temp_dir().join(format!("catalog-sync-queue-{}.json", Uuid::new_v4()));
        let config = OrchestratorConfig {
            workers: 1,
            snapshot_path: Some(path.clone()),
        };

        let (tx, rx) = mpsc::channel(8);
        for _ in 0..2 {
            tx.send(ChangeEvent::Viewed {
                kind: EntityKind::Listing,
                id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            orchestrator(&harness, config.clone()).run(rx),
        )
        .await
        .expect("orchestrator should stop once the stream ends")
        .unwrap();
        assert!(path.exists());

        let restarted = orchestrator(&harness, config);
        let queue = restarted.queue();
        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        restarted.run(rx).await.unwrap();

        // Restored on start, saved again on shutdown.
        assert_eq!(queue.stats().enqueued, 0);
        assert_eq!(queue.pending().await, 2);
        std::fs::remove_file(&path).unwrap();
    }
}
