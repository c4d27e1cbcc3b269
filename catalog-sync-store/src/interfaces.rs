//! Primary store trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreError;
use catalog_sync_shared::{Entity, EntityKind, References};

/// Read access to the primary store plus the one write the pipeline owns.
///
/// Implementations must be safe to share between the synchronizer, the
/// trending workers and backfill runs.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Read an entity by id. `Ok(None)` when it does not exist.
    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>, StoreError>;

    /// Resolve the denormalized lookups of an entity.
    ///
    /// A lookup that finds nothing leaves its field `None`; only a store
    /// failure is an error.
    async fn resolve_references(&self, entity: &Entity) -> Result<References, StoreError>;

    /// A page of entities of one kind in stable id order, tombstoned included.
    async fn list_page(
        &self,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Number of entities of one kind, tombstoned included.
    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError>;

    /// Entities of one kind currently flagged as trending.
    async fn trending(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError>;

    /// Entities with at least `min_views` views, in descending engagement
    /// order (views, likes, comments) with ties broken by id.
    async fn trending_candidates(
        &self,
        kind: EntityKind,
        min_views: u64,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Persist the trending flag of one entity.
    async fn set_trending(
        &self,
        kind: EntityKind,
        id: Uuid,
        is_trending: bool,
    ) -> Result<(), StoreError>;

    /// Number of entities of one kind currently flagged as trending.
    async fn trending_count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        Ok(self.trending(kind).await?.len())
    }

    /// The trending incumbent with the lowest engagement, if any.
    async fn min_trending(&self, kind: EntityKind) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .trending(kind)
            .await?
            .into_iter()
            .min_by(|a, b| {
                a.engagement_rank()
                    .cmp(&b.engagement_rank())
                    .then_with(|| b.id().cmp(&a.id()))
            }))
    }
}
