//! Loader module for the catalog sync pipeline.
//!
//! Writes documents for committed entity changes into the search index.
//!
//! Every operation here runs after the primary-store write has committed, so
//! nothing is propagated to the caller: failures are logged and reported as a
//! `SyncOutcome`. Nothing is retried either; drift is repaired by backfill.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::processor::{DocumentTransformer, ProcessedEntity};
use catalog_sync_repository::SearchIndexClient;
use catalog_sync_shared::{Entity, EntityKind, References, SearchDocument};
use catalog_sync_store::PrimaryStore;

/// Result of syncing one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Document saved.
    Synced,
    /// Document removed, or the entity no longer exists.
    Deleted,
    /// Nothing to do.
    Skipped,
    /// The write failed and was logged.
    Failed(String),
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

/// Aggregate of a batch sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub upserted: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn merge(&mut self, other: SyncSummary) {
        self.upserted += other.upserted;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// Best-effort synchronizer between the primary store and the search index.
pub struct IndexSynchronizer {
    store: Arc<dyn PrimaryStore>,
    client: Arc<SearchIndexClient>,
    transformer: DocumentTransformer,
}

impl IndexSynchronizer {
    pub fn new(store: Arc<dyn PrimaryStore>, client: Arc<SearchIndexClient>) -> Self {
        Self {
            store,
            client,
            transformer: DocumentTransformer::new(),
        }
    }

    /// Resolve references, degrading to empty ones if the lookup fails.
    async fn references(&self, entity: &Entity) -> References {
        match self.store.resolve_references(entity).await {
            Ok(references) => references,
            Err(e) => {
                warn!(
                    kind = %entity.kind(),
                    entity_id = %entity.id(),
                    error = %e,
                    "Reference lookup failed, indexing without denormalized fields"
                );
                References::default()
            }
        }
    }

    /// Save the entity's document, or delete it if the entity is tombstoned.
    #[instrument(skip_all, fields(kind = %entity.kind(), entity_id = %entity.id()))]
    pub async fn upsert(&self, entity: &Entity) -> SyncOutcome {
        let references = self.references(entity).await;

        match self.transformer.process(entity, &references) {
            ProcessedEntity::Index(document) => match self.client.save(&document).await {
                Ok(()) => {
                    debug!("Document synced");
                    SyncOutcome::Synced
                }
                Err(e) => {
                    error!(error = %e, "Failed to sync document");
                    SyncOutcome::Failed(e.to_string())
                }
            },
            ProcessedEntity::Delete { kind, object_id } => self.delete_document(kind, &object_id).await,
        }
    }

    /// Remove an entity's document.
    pub async fn delete(&self, kind: EntityKind, id: Uuid) -> SyncOutcome {
        self.delete_document(kind, &id.to_string()).await
    }

    async fn delete_document(&self, kind: EntityKind, object_id: &str) -> SyncOutcome {
        match self.client.delete(kind, object_id).await {
            Ok(()) => {
                debug!(kind = %kind, object_id = %object_id, "Document deleted");
                SyncOutcome::Deleted
            }
            Err(e) => {
                error!(kind = %kind, object_id = %object_id, error = %e, "Failed to delete document");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Re-read an entity and sync its current state. A missing entity has
    /// its document deleted.
    pub async fn sync_by_id(&self, kind: EntityKind, id: Uuid) -> SyncOutcome {
        match self.store.get(kind, id).await {
            Ok(Some(entity)) => self.upsert(&entity).await,
            Ok(None) => self.delete(kind, id).await,
            Err(e) => {
                error!(kind = %kind, entity_id = %id, error = %e, "Failed to read entity for sync");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run `sync_by_id` in the background. The caller may drop the handle.
    pub fn spawn_sync(self: &Arc<Self>, kind: EntityKind, id: Uuid) -> JoinHandle<SyncOutcome> {
        let synchronizer = Arc::clone(self);
        tokio::spawn(async move { synchronizer.sync_by_id(kind, id).await })
    }

    /// Run `delete` in the background. The caller may drop the handle.
    pub fn spawn_delete(self: &Arc<Self>, kind: EntityKind, id: Uuid) -> JoinHandle<SyncOutcome> {
        let synchronizer = Arc::clone(self);
        tokio::spawn(async move { synchronizer.delete(kind, id).await })
    }

    /// Sync a batch of entities of one kind.
    ///
    /// Active entities are saved with one batch write; tombstoned ones are
    /// deleted individually.
    #[instrument(skip(self, entities), fields(count = entities.len()))]
    pub async fn batch_upsert(&self, kind: EntityKind, entities: &[Entity]) -> SyncSummary {
        let mut summary = SyncSummary::default();
        let mut documents: Vec<SearchDocument> = Vec::with_capacity(entities.len());

        for entity in entities.iter().filter(|e| e.kind() == kind) {
            let references = self.references(entity).await;
            match self.transformer.process(entity, &references) {
                ProcessedEntity::Index(document) => documents.push(document),
                ProcessedEntity::Delete { kind, object_id } => {
                    match self.delete_document(kind, &object_id).await {
                        SyncOutcome::Failed(_) => summary.failed += 1,
                        _ => summary.deleted += 1,
                    }
                }
            }
        }

        if documents.is_empty() {
            return summary;
        }

        match self.client.save_batch(kind, &documents).await {
            Ok(result) => {
                for failure in result.results.iter().filter(|r| !r.success) {
                    error!(
                        kind = %kind,
                        object_id = %failure.object_id,
                        error = ?failure.error,
                        "Failed to sync document in batch"
                    );
                }
                summary.upserted += result.succeeded;
                summary.failed += result.failed;
            }
            Err(e) => {
                error!(kind = %kind, count = documents.len(), error = %e, "Batch sync failed");
                summary.failed += documents.len();
            }
        }

        info!(
            kind = %kind,
            upserted = summary.upserted,
            deleted = summary.deleted,
            failed = summary.failed,
            "Batch synced"
        );
        summary
    }
}
