//! Fixtures shared by the pipeline's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use catalog_sync_repository::{InMemorySearchIndex, SearchIndexClient};
use catalog_sync_shared::{
    Engagement, Entity, EntityKind, Listing, References, Thread, UserProfile,
};
use catalog_sync_store::{MemoryStore, PrimaryStore, StoreError};

use crate::loader::IndexSynchronizer;

fn engagement(views: u64) -> Engagement {
    Engagement {
        view_count: views,
        ..Default::default()
    }
}

pub fn listing(views: u64) -> Entity {
    let created = Utc::now() - Duration::hours(1);
    Entity::Listing(Listing {
        id: Uuid::new_v4(),
        seller_id: Uuid::new_v4(),
        title: "Vintage road bike".to_string(),
        description: Some("Steel frame, recently serviced".to_string()),
        price: 250.0,
        currency: Some("EUR".to_string()),
        condition: Some("used".to_string()),
        sale_type: Some("fixed".to_string()),
        delivery_type: Some("pickup".to_string()),
        category_id: None,
        sub_category_id: None,
        tags: vec!["bike".to_string()],
        city: Some("Lisbon".to_string()),
        country: Some("PT".to_string()),
        engagement: engagement(views),
        lifecycle: Default::default(),
        is_trending: false,
        created_at: created,
        updated_at: created,
    })
}

pub fn thread(views: u64) -> Entity {
    let created = Utc::now() - Duration::hours(1);
    Entity::Thread(Thread {
        id: Uuid::new_v4(),
        author_id: Uuid::new_v4(),
        title: "Looking for a road bike".to_string(),
        body: Some("Size 56, under 300".to_string()),
        budget_min: Some(100.0),
        budget_max: Some(300.0),
        category_id: None,
        sub_category_id: None,
        tags: vec!["bike".to_string()],
        engagement: engagement(views),
        lifecycle: Default::default(),
        is_trending: false,
        created_at: created,
        updated_at: created,
    })
}

pub fn user(views: u64) -> Entity {
    let created = Utc::now() - Duration::hours(1);
    let id = Uuid::new_v4();
    Entity::User(UserProfile {
        id,
        username: format!("rider-{}", id.simple()),
        display_name: None,
        bio: Some("Weekend cyclist".to_string()),
        avatar_url: None,
        city: Some("Lisbon".to_string()),
        country: Some("PT".to_string()),
        latitude: None,
        longitude: None,
        is_verified: false,
        engagement: engagement(views),
        lifecycle: Default::default(),
        is_trending: false,
        created_at: created,
        updated_at: created,
    })
}

/// In-memory store and index wired through a synchronizer.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub index: Arc<InMemorySearchIndex>,
    pub client: Arc<SearchIndexClient>,
    pub synchronizer: Arc<IndexSynchronizer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let index = Arc::new(InMemorySearchIndex::new());
        let client = Arc::new(SearchIndexClient::new(Box::new(index.clone())));
        let synchronizer = Arc::new(IndexSynchronizer::new(
            store.clone() as Arc<dyn PrimaryStore>,
            client.clone(),
        ));
        Self {
            store,
            index,
            client,
            synchronizer,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn PrimaryStore> {
        self.store.clone()
    }

    /// Insert entities into the store.
    pub async fn seed(&self, entities: impl IntoIterator<Item = Entity>) {
        for entity in entities {
            self.store
                .upsert(entity)
                .await
                .expect("seeding the memory store cannot fail");
        }
    }
}

/// Delegates to a memory store and counts trending writes.
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    pub writes: AtomicUsize,
    /// 1-based trending write that is rejected.
    fail_write: Option<usize>,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            fail_write: None,
        }
    }

    /// Reject the `nth` trending write; every other write goes through.
    pub fn failing_write(inner: Arc<MemoryStore>, nth: usize) -> Self {
        Self {
            fail_write: Some(nth),
            ..Self::new(inner)
        }
    }
}

#[async_trait]
impl PrimaryStore for CountingStore {
    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>, StoreError> {
        self.inner.get(kind, id).await
    }

    async fn resolve_references(&self, entity: &Entity) -> Result<References, StoreError> {
        self.inner.resolve_references(entity).await
    }

    async fn list_page(
        &self,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        self.inner.list_page(kind, offset, limit).await
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        self.inner.count(kind).await
    }

    async fn trending(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        self.inner.trending(kind).await
    }

    async fn trending_candidates(
        &self,
        kind: EntityKind,
        min_views: u64,
    ) -> Result<Vec<Entity>, StoreError> {
        self.inner.trending_candidates(kind, min_views).await
    }

    async fn set_trending(
        &self,
        kind: EntityKind,
        id: Uuid,
        is_trending: bool,
    ) -> Result<(), StoreError> {
        let nth = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_write == Some(nth) {
            return Err(StoreError::unavailable("trending write rejected"));
        }
        self.inner.set_trending(kind, id, is_trending).await
    }
}
