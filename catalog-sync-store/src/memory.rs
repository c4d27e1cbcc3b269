//! In-memory primary store.
//!
//! Holds a catalog in process memory and plays the part of the CRUD layer:
//! its mutation methods commit a change and then publish a `ChangeEvent`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogExport, Category};
use crate::errors::StoreError;
use crate::events::ChangeEvent;
use crate::interfaces::PrimaryStore;
use catalog_sync_shared::{Entity, EntityKind, References};

#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<EntityKind, BTreeMap<Uuid, Entity>>>,
    categories: RwLock<HashMap<Uuid, String>>,
    changes: Option<mpsc::Sender<ChangeEvent>>,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Store without an after-commit subscriber.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that publishes every committed mutation on the returned receiver.
    pub fn with_changes(buffer: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let store = Self {
            changes: Some(tx),
            ..Self::default()
        };
        (store, rx)
    }

    /// Load a catalog export without publishing events for it.
    pub async fn import(&self, export: CatalogExport) {
        let mut entities = self.entities.write().await;
        let mut categories = self.categories.write().await;

        categories.extend(export.categories.into_iter().map(|c| (c.id, c.name)));

        let all = export
            .listings
            .into_iter()
            .map(Entity::Listing)
            .chain(export.threads.into_iter().map(Entity::Thread))
            .chain(export.users.into_iter().map(Entity::User));
        for entity in all {
            entities
                .entry(entity.kind())
                .or_default()
                .insert(entity.id(), entity);
        }

        info!(
            listings = entities.get(&EntityKind::Listing).map_or(0, BTreeMap::len),
            threads = entities.get(&EntityKind::Thread).map_or(0, BTreeMap::len),
            users = entities.get(&EntityKind::User).map_or(0, BTreeMap::len),
            categories = categories.len(),
            "Catalog imported"
        );
    }

    /// Read a JSON catalog export from disk into a new store.
    pub async fn load(
        path: impl AsRef<Path>,
        changes: Option<mpsc::Sender<ChangeEvent>>,
    ) -> Result<Self, StoreError> {
        let export = CatalogExport::load(path).await?;
        let store = Self {
            changes,
            ..Self::default()
        };
        store.import(export).await;
        Ok(store)
    }

    /// Current contents as a catalog export, ordered by id.
    pub async fn export(&self) -> CatalogExport {
        let entities = self.entities.read().await;
        let categories = self.categories.read().await;

        let mut export = CatalogExport {
            categories: categories
                .iter()
                .map(|(id, name)| Category {
                    id: *id,
                    name: name.clone(),
                })
                .collect(),
            ..Default::default()
        };
        export.categories.sort_by_key(|c| c.id);

        for entity in entities.values().flat_map(BTreeMap::values) {
            match entity.clone() {
                Entity::Listing(listing) => export.listings.push(listing),
                Entity::Thread(thread) => export.threads.push(thread),
                Entity::User(user) => export.users.push(user),
            }
        }
        export
    }

    /// Persist the current contents, trending flags included, to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let export = self.export().await;
        export.save(path.as_ref()).await?;
        info!(
            path = %path.as_ref().display(),
            listings = export.listings.len(),
            threads = export.threads.len(),
            users = export.users.len(),
            "Catalog saved"
        );
        Ok(())
    }

    pub async fn add_category(&self, id: Uuid, name: impl Into<String>) {
        self.categories.write().await.insert(id, name.into());
    }

    /// Make every read and write fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("primary store unavailable"));
        }
        Ok(())
    }

    async fn publish(&self, event: ChangeEvent) {
        if let Some(tx) = &self.changes {
            if tx.send(event).await.is_err() {
                warn!(
                    kind = %event.kind(),
                    entity_id = %event.id(),
                    "Change subscriber is gone, dropping event"
                );
            }
        }
    }

    /// Create or replace an entity, then publish `Upserted`, or
    /// `SoftDeleted` if the new state is tombstoned.
    pub async fn upsert(&self, entity: Entity) -> Result<(), StoreError> {
        self.check_available()?;
        let (kind, id) = (entity.kind(), entity.id());
        let tombstoned = entity.lifecycle().is_tombstoned();

        self.entities
            .write()
            .await
            .entry(kind)
            .or_default()
            .insert(id, entity);

        let event = if tombstoned {
            ChangeEvent::SoftDeleted { kind, id }
        } else {
            ChangeEvent::Upserted { kind, id }
        };
        self.publish(event).await;
        Ok(())
    }

    /// Mark an entity deleted without removing it.
    pub async fn soft_delete(&self, kind: EntityKind, id: Uuid) -> Result<(), StoreError> {
        self.update(kind, id, |entity| match entity {
            Entity::Listing(l) => l.lifecycle.is_deleted = true,
            Entity::Thread(t) => t.lifecycle.is_deleted = true,
            Entity::User(u) => u.lifecycle.is_deleted = true,
        })
        .await?;
        self.publish(ChangeEvent::SoftDeleted { kind, id }).await;
        Ok(())
    }

    pub async fn remove(&self, kind: EntityKind, id: Uuid) -> Result<(), StoreError> {
        self.check_available()?;
        let removed = self
            .entities
            .write()
            .await
            .get_mut(&kind)
            .and_then(|entities| entities.remove(&id));

        if removed.is_none() {
            return Err(StoreError::not_found(kind, id));
        }
        self.publish(ChangeEvent::Removed { kind, id }).await;
        Ok(())
    }

    /// Increment the view counter and publish `Viewed`.
    pub async fn record_view(&self, kind: EntityKind, id: Uuid) -> Result<u64, StoreError> {
        let views = self
            .update(kind, id, |entity| match entity {
                Entity::Listing(l) => {
                    l.engagement.view_count += 1;
                    l.engagement.view_count
                }
                Entity::Thread(t) => {
                    t.engagement.view_count += 1;
                    t.engagement.view_count
                }
                Entity::User(u) => {
                    u.engagement.view_count += 1;
                    u.engagement.view_count
                }
            })
            .await?;
        self.publish(ChangeEvent::Viewed { kind, id }).await;
        Ok(views)
    }

    async fn update<T>(
        &self,
        kind: EntityKind,
        id: Uuid,
        apply: impl FnOnce(&mut Entity) -> T,
    ) -> Result<T, StoreError> {
        self.check_available()?;
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&kind)
            .and_then(|entities| entities.get_mut(&id))
            .ok_or_else(|| StoreError::not_found(kind, id))?;

        let result = apply(entity);
        touch(entity);
        Ok(result)
    }

    async fn select(
        &self,
        kind: EntityKind,
        predicate: impl Fn(&Entity) -> bool,
    ) -> Result<Vec<Entity>, StoreError> {
        self.check_available()?;
        Ok(self
            .entities
            .read()
            .await
            .get(&kind)
            .map(|entities| entities.values().filter(|e| predicate(e)).cloned().collect())
            .unwrap_or_default())
    }
}

fn touch(entity: &mut Entity) {
    let now = Utc::now();
    match entity {
        Entity::Listing(l) => l.updated_at = now,
        Entity::Thread(t) => t.updated_at = now,
        Entity::User(u) => u.updated_at = now,
    }
}

#[async_trait]
impl PrimaryStore for MemoryStore {
    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>, StoreError> {
        self.check_available()?;
        Ok(self
            .entities
            .read()
            .await
            .get(&kind)
            .and_then(|entities| entities.get(&id))
            .cloned())
    }

    async fn resolve_references(&self, entity: &Entity) -> Result<References, StoreError> {
        self.check_available()?;
        let categories = self.categories.read().await;
        let (category_id, sub_category_id) = entity.category_refs();

        let lookup = |id: Option<Uuid>| {
            let id = id?;
            let name = categories.get(&id).cloned();
            if name.is_none() {
                warn!(entity_id = %entity.id(), category_id = %id, "Category not found");
            }
            name
        };

        Ok(References {
            category_name: lookup(category_id),
            sub_category_name: lookup(sub_category_id),
        })
    }

    async fn list_page(
        &self,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        self.check_available()?;
        Ok(self
            .entities
            .read()
            .await
            .get(&kind)
            .map(|entities| entities.values().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        self.check_available()?;
        Ok(self
            .entities
            .read()
            .await
            .get(&kind)
            .map_or(0, BTreeMap::len))
    }

    async fn trending(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        self.select(kind, Entity::is_trending).await
    }

    async fn trending_candidates(
        &self,
        kind: EntityKind,
        min_views: u64,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut candidates = self
            .select(kind, |e| e.engagement().view_count >= min_views)
            .await?;
        candidates.sort_by(|a, b| {
            b.engagement_rank()
                .cmp(&a.engagement_rank())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(candidates)
    }

    async fn set_trending(
        &self,
        kind: EntityKind,
        id: Uuid,
        is_trending: bool,
    ) -> Result<(), StoreError> {
        self.update(kind, id, |entity| entity.set_trending(is_trending))
            .await?;
        debug!(kind = %kind, entity_id = %id, is_trending, "Trending flag persisted");
        Ok(())
    }
}
