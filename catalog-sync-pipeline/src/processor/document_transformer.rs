//! Document transformer implementation.
//!
//! Maps a loaded entity and its resolved references to the flat document
//! stored in that entity's namespace.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use catalog_sync_shared::{
    Entity, EntityKind, GeoPoint, Listing, ListingDocument, References, SearchDocument, Thread,
    ThreadDocument, UserDocument, UserProfile,
};

/// What the index should do with an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedEntity {
    /// Document to be saved (create or overwrite).
    Index(SearchDocument),
    /// Document to be deleted: the entity is tombstoned.
    Delete { kind: EntityKind, object_id: String },
}

/// Pure entity-to-document mapping.
///
/// The same entity and references always produce the same document, and a
/// missing reference becomes `null` rather than an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTransformer;

impl DocumentTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Decide between saving and deleting, and build the document if saving.
    #[instrument(skip_all, fields(kind = %entity.kind(), entity_id = %entity.id()))]
    pub fn process(&self, entity: &Entity, references: &References) -> ProcessedEntity {
        if entity.lifecycle().is_tombstoned() {
            debug!("Entity is tombstoned, scheduling delete");
            return ProcessedEntity::Delete {
                kind: entity.kind(),
                object_id: entity.id().to_string(),
            };
        }
        ProcessedEntity::Index(self.transform(entity, references))
    }

    pub fn transform(&self, entity: &Entity, references: &References) -> SearchDocument {
        match entity {
            Entity::Listing(listing) => {
                SearchDocument::Listing(Self::listing_document(listing, references))
            }
            Entity::Thread(thread) => {
                SearchDocument::Thread(Self::thread_document(thread, references))
            }
            Entity::User(user) => SearchDocument::User(Self::user_document(user)),
        }
    }

    fn listing_document(listing: &Listing, references: &References) -> ListingDocument {
        ListingDocument {
            object_id: listing.id.to_string(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price,
            currency: listing.currency.clone(),
            condition: listing.condition.clone(),
            sale_type: listing.sale_type.clone(),
            delivery_type: listing.delivery_type.clone(),
            category_name: references.category_name.clone(),
            sub_category_name: references.sub_category_name.clone(),
            tags: listing.tags.clone(),
            city: listing.city.clone(),
            country: listing.country.clone(),
            seller_id: listing.seller_id.to_string(),
            view_count: listing.engagement.view_count,
            like_count: listing.engagement.like_count,
            comment_count: listing.engagement.comment_count,
            is_trending: listing.is_trending,
            is_closed: listing.lifecycle.is_closed,
            created_at: epoch_millis(listing.created_at),
            updated_at: epoch_millis(listing.updated_at),
        }
    }

    fn thread_document(thread: &Thread, references: &References) -> ThreadDocument {
        ThreadDocument {
            object_id: thread.id.to_string(),
            title: thread.title.clone(),
            body: thread.body.clone(),
            budget_min: thread.budget_min,
            budget_max: thread.budget_max,
            category_name: references.category_name.clone(),
            sub_category_name: references.sub_category_name.clone(),
            tags: thread.tags.clone(),
            author_id: thread.author_id.to_string(),
            view_count: thread.engagement.view_count,
            like_count: thread.engagement.like_count,
            comment_count: thread.engagement.comment_count,
            is_trending: thread.is_trending,
            is_closed: thread.lifecycle.is_closed,
            created_at: epoch_millis(thread.created_at),
            updated_at: epoch_millis(thread.updated_at),
        }
    }

    fn user_document(user: &UserProfile) -> UserDocument {
        // A point needs both coordinates.
        let geoloc = match (user.latitude, user.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };

        UserDocument {
            object_id: user.id.to_string(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            avatar_url: user.avatar_url.clone(),
            city: user.city.clone(),
            country: user.country.clone(),
            geoloc,
            is_verified: user.is_verified,
            view_count: user.engagement.view_count,
            like_count: user.engagement.like_count,
            comment_count: user.engagement.comment_count,
            is_trending: user.is_trending,
            created_at: epoch_millis(user.created_at),
            updated_at: epoch_millis(user.updated_at),
        }
    }
}

fn epoch_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
