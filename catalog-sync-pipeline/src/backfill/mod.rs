//! Backfill module for the catalog sync pipeline.
//!
//! Repopulates the search index from the primary store. Batches run one
//! after another with a pause in between to keep the load on the engine
//! predictable. Each run overwrites every document it touches, so running
//! it again on an unchanged store leaves the index as it was.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::errors::PipelineError;
use crate::loader::{IndexSynchronizer, SyncSummary};
use catalog_sync_repository::SearchIndexClient;
use catalog_sync_shared::EntityKind;
use catalog_sync_store::PrimaryStore;

/// Configuration for backfill runs.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Entities read and written per batch.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay: Duration::from_millis(1000),
        }
    }
}

/// Outcome of syncing one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindReport {
    pub kind: EntityKind,
    pub scanned: usize,
    pub batches: usize,
    pub summary: SyncSummary,
}

impl KindReport {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            scanned: 0,
            batches: 0,
            summary: SyncSummary::default(),
        }
    }
}

/// Outcome of a multi-kind run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub kinds: Vec<KindReport>,
}

impl BackfillReport {
    pub fn totals(&self) -> SyncSummary {
        let mut totals = SyncSummary::default();
        for report in &self.kinds {
            totals.merge(report.summary);
        }
        totals
    }

    pub fn has_failures(&self) -> bool {
        self.totals().failed > 0
    }
}

/// Bulk sync between the primary store and the search index.
pub struct Backfill {
    store: Arc<dyn PrimaryStore>,
    synchronizer: Arc<IndexSynchronizer>,
    client: Arc<SearchIndexClient>,
    config: BackfillConfig,
}

impl Backfill {
    pub fn new(
        store: Arc<dyn PrimaryStore>,
        synchronizer: Arc<IndexSynchronizer>,
        client: Arc<SearchIndexClient>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            store,
            synchronizer,
            client,
            config,
        }
    }

    /// Sync every entity of one kind.
    ///
    /// Active entities are saved and tombstoned ones deleted. Index failures
    /// are counted in the report; a store read failure aborts the run.
    #[instrument(skip(self), fields(batch_size = self.config.batch_size))]
    pub async fn sync_kind(&self, kind: EntityKind) -> Result<KindReport, PipelineError> {
        let batch_size = self.config.batch_size.max(1);
        let total = self.store.count(kind).await?;
        let mut report = KindReport::new(kind);

        info!(kind = %kind, total, "Starting backfill");

        loop {
            let batch = self.store.list_page(kind, report.scanned, batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let summary = self.synchronizer.batch_upsert(kind, &batch).await;
            report.summary.merge(summary);
            report.scanned += batch.len();
            report.batches += 1;

            info!(
                kind = %kind,
                batch = report.batches,
                progress = report.scanned,
                total,
                "Backfill batch done"
            );

            if batch.len() < batch_size {
                break;
            }
            tokio::time::sleep(self.config.batch_delay).await;
        }

        if report.summary.failed > 0 {
            warn!(kind = %kind, failed = report.summary.failed, "Backfill finished with failures");
        } else {
            info!(
                kind = %kind,
                upserted = report.summary.upserted,
                deleted = report.summary.deleted,
                "Backfill finished"
            );
        }
        Ok(report)
    }

    /// Sync every kind in turn.
    pub async fn sync_all(&self) -> Result<BackfillReport, PipelineError> {
        let mut report = BackfillReport::default();
        for kind in EntityKind::ALL {
            report.kinds.push(self.sync_kind(kind).await?);
        }
        Ok(report)
    }

    /// Delete every document from every namespace.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), PipelineError> {
        for kind in EntityKind::ALL {
            self.client.clear(kind).await?;
            warn!(kind = %kind, "Search namespace cleared");
        }
        Ok(())
    }

    /// Create every namespace with its settings if absent.
    #[instrument(skip(self))]
    pub async fn configure(&self) -> Result<(), PipelineError> {
        for kind in EntityKind::ALL {
            self.client.configure(kind).await?;
            info!(kind = %kind, "Search namespace configured");
        }
        Ok(())
    }

    /// Configure the namespaces, then run a full sync.
    pub async fn setup(&self) -> Result<BackfillReport, PipelineError> {
        self.configure().await?;
        self.sync_all().await
    }
}
