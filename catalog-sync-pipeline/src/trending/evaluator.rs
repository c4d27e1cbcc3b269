//! Trending evaluator implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::loader::IndexSynchronizer;
use crate::queue::{Job, JobHandler};
use catalog_sync_shared::{Entity, EntityKind};
use catalog_sync_store::PrimaryStore;

/// Name of the queue trending jobs run on.
pub const TRENDING_QUEUE: &str = "trending";

/// Recompute request for one entity. The payload only names the entity;
/// evaluation always reads current counters from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingJob {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

impl TrendingJob {
    pub fn new(kind: EntityKind, entity_id: Uuid) -> Self {
        Self {
            kind,
            entity_id,
            enqueued_at: Utc::now(),
        }
    }
}

/// Configuration for trending evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingConfig {
    /// Minimum view count.
    pub min_views: u64,
    /// Maximum trending entities per kind.
    pub cap: usize,
    /// Only entities created within this window qualify.
    pub window: Option<Duration>,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            min_views: 10,
            cap: 50,
            window: None,
        }
    }
}

/// Why an evaluation ended where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Soft-deleted, disabled or closed.
    Inactive,
    BelowThreshold,
    OutsideWindow,
    /// Admitted while the set had room.
    UnderCap,
    /// Already trending and still qualifies.
    Incumbent,
    /// Admitted by evicting the lowest-view incumbent.
    Displaced,
    /// Qualifies but the set is full of entities with at least as many views.
    CapFull,
    /// The entity no longer exists.
    Missing,
}

/// Outcome of evaluating one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    pub was_trending: bool,
    pub is_trending: bool,
    pub reason: Reason,
    /// Incumbent demoted to make room.
    pub evicted: Option<Uuid>,
}

impl Evaluation {
    pub fn changed(&self) -> bool {
        self.was_trending != self.is_trending
    }
}

/// Counts from a bulk recomputation of one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    pub scanned: usize,
    pub changed: usize,
    pub trending: usize,
}

/// One lock per kind; admission and eviction for a kind are serialized.
#[derive(Default)]
struct KindLocks {
    listing: Mutex<()>,
    thread: Mutex<()>,
    user: Mutex<()>,
}

impl KindLocks {
    async fn lock(&self, kind: EntityKind) -> MutexGuard<'_, ()> {
        match kind {
            EntityKind::Listing => self.listing.lock().await,
            EntityKind::Thread => self.thread.lock().await,
            EntityKind::User => self.user.lock().await,
        }
    }
}

/// Decides and persists the trending flag.
///
/// The cap is a hard ceiling per kind. When the set is full, a candidate is
/// admitted only with strictly more views than the lowest incumbent, which
/// is demoted in the same critical section.
pub struct TrendingEvaluator {
    store: Arc<dyn PrimaryStore>,
    synchronizer: Option<Arc<IndexSynchronizer>>,
    config: TrendingConfig,
    locks: KindLocks,
}

impl TrendingEvaluator {
    pub fn new(store: Arc<dyn PrimaryStore>, config: TrendingConfig) -> Self {
        Self {
            store,
            synchronizer: None,
            config,
            locks: KindLocks::default(),
        }
    }

    /// Re-sync entities whose flag changes.
    pub fn with_synchronizer(mut self, synchronizer: Arc<IndexSynchronizer>) -> Self {
        self.synchronizer = Some(synchronizer);
        self
    }

    /// Cap-independent criteria: lifecycle, threshold and recency window.
    pub fn criteria(&self, entity: &Entity, now: DateTime<Utc>) -> Result<(), Reason> {
        if !entity.lifecycle().is_active() {
            return Err(Reason::Inactive);
        }
        if entity.engagement().view_count < self.config.min_views {
            return Err(Reason::BelowThreshold);
        }
        if let Some(window) = self.config.window {
            if entity.created_at() < now - window {
                return Err(Reason::OutsideWindow);
            }
        }
        Ok(())
    }

    /// Evaluate one entity and persist its flag if it changed.
    ///
    /// Every flag write that committed is reindexed, also when a later
    /// write of the same evaluation failed.
    #[instrument(skip(self))]
    pub async fn evaluate(&self, kind: EntityKind, id: Uuid) -> Result<Evaluation, PipelineError> {
        let mut committed = Vec::new();
        let result = {
            let _guard = self.locks.lock(kind).await;
            self.evaluate_locked(kind, id, Utc::now(), &mut committed)
                .await
        };
        self.reindex(kind, &committed).await;
        result
    }

    /// Caller holds the kind lock. Ids whose flag was written are pushed
    /// to `committed`.
    async fn evaluate_locked(
        &self,
        kind: EntityKind,
        id: Uuid,
        now: DateTime<Utc>,
        committed: &mut Vec<Uuid>,
    ) -> Result<Evaluation, PipelineError> {
        let Some(entity) = self.store.get(kind, id).await? else {
            debug!(kind = %kind, entity_id = %id, "Entity missing, nothing to evaluate");
            return Ok(Evaluation {
                kind,
                entity_id: id,
                was_trending: false,
                is_trending: false,
                reason: Reason::Missing,
                evicted: None,
            });
        };

        let was_trending = entity.is_trending();
        let (is_trending, reason, evicted) = match self.criteria(&entity, now) {
            Err(reason) => (false, reason, None),
            Ok(()) if was_trending => (true, Reason::Incumbent, None),
            Ok(()) => self.admit(kind, &entity, committed).await?,
        };

        if is_trending != was_trending {
            self.store.set_trending(kind, id, is_trending).await?;
            committed.push(id);
        }

        let evaluation = Evaluation {
            kind,
            entity_id: id,
            was_trending,
            is_trending,
            reason,
            evicted,
        };
        debug!(
            kind = %kind,
            entity_id = %id,
            was_trending,
            is_trending,
            reason = ?reason,
            evicted = ?evicted,
            "Trending evaluated"
        );
        Ok(evaluation)
    }

    /// Cap admission for a qualifying entity that is not yet trending.
    ///
    /// The incumbent is demoted before the candidate is promoted, so the
    /// stored set never exceeds the cap.
    async fn admit(
        &self,
        kind: EntityKind,
        entity: &Entity,
        committed: &mut Vec<Uuid>,
    ) -> Result<(bool, Reason, Option<Uuid>), PipelineError> {
        if self.store.trending_count(kind).await? < self.config.cap {
            return Ok((true, Reason::UnderCap, None));
        }

        match self.store.min_trending(kind).await? {
            Some(min) if entity.engagement().view_count > min.engagement().view_count => {
                self.store.set_trending(kind, min.id(), false).await?;
                committed.push(min.id());
                info!(
                    kind = %kind,
                    entity_id = %entity.id(),
                    evicted_id = %min.id(),
                    "Evicted lowest trending entity"
                );
                Ok((true, Reason::Displaced, Some(min.id())))
            }
            _ => Ok((false, Reason::CapFull, None)),
        }
    }

    async fn reindex(&self, kind: EntityKind, ids: &[Uuid]) {
        let Some(synchronizer) = &self.synchronizer else {
            return;
        };
        for &id in ids {
            synchronizer.sync_by_id(kind, id).await;
        }
    }

    /// Reconcile one kind: the trending set becomes the first `cap`
    /// qualifying entities in descending engagement order, and every
    /// incumbent outside it is demoted.
    ///
    /// Unlike `evaluate`, this also trims a set that is over the cap, e.g.
    /// after the cap was lowered.
    #[instrument(skip(self))]
    pub async fn recompute_kind(&self, kind: EntityKind) -> Result<RecomputeReport, PipelineError> {
        let mut committed = Vec::new();
        let result = {
            let _guard = self.locks.lock(kind).await;
            self.recompute_locked(kind, &mut committed).await
        };
        self.reindex(kind, &committed).await;
        let report = result?;

        info!(
            kind = %kind,
            scanned = report.scanned,
            changed = report.changed,
            trending = report.trending,
            "Trending recomputed"
        );
        Ok(report)
    }

    /// Caller holds the kind lock.
    async fn recompute_locked(
        &self,
        kind: EntityKind,
        committed: &mut Vec<Uuid>,
    ) -> Result<RecomputeReport, PipelineError> {
        let mut entities = self
            .store
            .trending_candidates(kind, self.config.min_views)
            .await?;
        let seen: HashSet<Uuid> = entities.iter().map(Entity::id).collect();
        entities.extend(
            self.store
                .trending(kind)
                .await?
                .into_iter()
                .filter(|e| !seen.contains(&e.id())),
        );
        entities.sort_by(|a, b| {
            b.engagement_rank()
                .cmp(&a.engagement_rank())
                .then_with(|| a.id().cmp(&b.id()))
        });

        let now = Utc::now();
        let mut admitted = 0usize;

        // Demotions first, so the stored set stays within the cap while
        // promotions are written.
        let mut demote = Vec::new();
        let mut promote = Vec::new();
        for entity in &entities {
            let qualifies = self.criteria(entity, now).is_ok() && admitted < self.config.cap;
            if qualifies {
                admitted += 1;
            }
            match (entity.is_trending(), qualifies) {
                (true, false) => demote.push(entity.id()),
                (false, true) => promote.push(entity.id()),
                _ => {}
            }
        }

        for (ids, is_trending) in [(demote, false), (promote, true)] {
            for id in ids {
                self.store.set_trending(kind, id, is_trending).await?;
                committed.push(id);
            }
        }

        Ok(RecomputeReport {
            scanned: entities.len(),
            changed: committed.len(),
            trending: self.store.trending_count(kind).await?,
        })
    }

    pub async fn recompute_all(&self) -> Result<BTreeMap<EntityKind, RecomputeReport>, PipelineError> {
        let mut reports = BTreeMap::new();
        for kind in EntityKind::ALL {
            reports.insert(kind, self.recompute_kind(kind).await?);
        }
        Ok(reports)
    }
}

#[async_trait]
impl JobHandler<TrendingJob> for TrendingEvaluator {
    async fn handle(&self, job: &Job<TrendingJob>) -> Result<(), PipelineError> {
        let evaluation = self
            .evaluate(job.payload.kind, job.payload.entity_id)
            .await?;
        if evaluation.changed() {
            info!(
                kind = %evaluation.kind,
                entity_id = %evaluation.entity_id,
                is_trending = evaluation.is_trending,
                reason = ?evaluation.reason,
                "Trending flag changed"
            );
        }
        Ok(())
    }
}
