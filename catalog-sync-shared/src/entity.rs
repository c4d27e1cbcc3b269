//! Primary-store entities as seen by the sync pipeline.
//!
//! These are read-only projections of what the primary store owns. The
//! pipeline only ever writes one field back: the `is_trending` flag.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three entity families that have their own search namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Listing,
    Thread,
    User,
}

impl EntityKind {
    /// Every kind, in the order full syncs walk them.
    pub const ALL: [EntityKind; 3] = [EntityKind::Listing, EntityKind::Thread, EntityKind::User];

    /// Namespace suffix used to derive the index name.
    pub fn namespace(&self) -> &'static str {
        match self {
            EntityKind::Listing => "listings",
            EntityKind::Thread => "threads",
            EntityKind::User => "users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listing" | "listings" => Ok(EntityKind::Listing),
            "thread" | "threads" => Ok(EntityKind::Thread),
            "user" | "users" => Ok(EntityKind::User),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// Engagement counters maintained by the primary store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engagement {
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
}

/// Lifecycle flags. Any of them set disqualifies an entity from trending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lifecycle {
    pub is_deleted: bool,
    pub is_disabled: bool,
    pub is_closed: bool,
}

impl Lifecycle {
    /// Soft-deleted or disabled entities must not have a search document.
    pub fn is_tombstoned(&self) -> bool {
        self.is_deleted || self.is_disabled
    }

    pub fn is_active(&self) -> bool {
        !(self.is_deleted || self.is_disabled || self.is_closed)
    }
}

/// Denormalized reference values resolved from lookup tables at transform time.
///
/// A failed or empty lookup leaves the field `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub category_name: Option<String>,
    pub sub_category_name: Option<String>,
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub sale_type: Option<String>,
    #[serde(default)]
    pub delivery_type: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub sub_category_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub is_trending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A discussion thread, typically a buyer request with a budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub budget_min: Option<f64>,
    #[serde(default)]
    pub budget_max: Option<f64>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub sub_category_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub is_trending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A public user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub is_trending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Any entity the pipeline syncs or evaluates.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Listing(Listing),
    Thread(Thread),
    User(UserProfile),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Listing(_) => EntityKind::Listing,
            Entity::Thread(_) => EntityKind::Thread,
            Entity::User(_) => EntityKind::User,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Entity::Listing(l) => l.id,
            Entity::Thread(t) => t.id,
            Entity::User(u) => u.id,
        }
    }

    pub fn engagement(&self) -> &Engagement {
        match self {
            Entity::Listing(l) => &l.engagement,
            Entity::Thread(t) => &t.engagement,
            Entity::User(u) => &u.engagement,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        match self {
            Entity::Listing(l) => &l.lifecycle,
            Entity::Thread(t) => &t.lifecycle,
            Entity::User(u) => &u.lifecycle,
        }
    }

    pub fn is_trending(&self) -> bool {
        match self {
            Entity::Listing(l) => l.is_trending,
            Entity::Thread(t) => t.is_trending,
            Entity::User(u) => u.is_trending,
        }
    }

    pub fn set_trending(&mut self, value: bool) {
        match self {
            Entity::Listing(l) => l.is_trending = value,
            Entity::Thread(t) => t.is_trending = value,
            Entity::User(u) => u.is_trending = value,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Entity::Listing(l) => l.created_at,
            Entity::Thread(t) => t.created_at,
            Entity::User(u) => u.created_at,
        }
    }

    /// Category and sub-category ids that need resolving into names.
    pub fn category_refs(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Entity::Listing(l) => (l.category_id, l.sub_category_id),
            Entity::Thread(t) => (t.category_id, t.sub_category_id),
            Entity::User(_) => (None, None),
        }
    }

    /// Ordering key for "descending engagement": views, then likes, then comments.
    pub fn engagement_rank(&self) -> (u64, u64, u64) {
        let e = self.engagement();
        (e.view_count, e.like_count, e.comment_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("listings".parse::<EntityKind>().unwrap(), EntityKind::Listing);
        assert_eq!("Thread".parse::<EntityKind>().unwrap(), EntityKind::Thread);
        assert_eq!(" users ".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert!("orders".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_kind_display_matches_namespace() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.to_string(), kind.namespace());
        }
    }

    #[test]
    fn test_lifecycle_flags() {
        let closed = Lifecycle {
            is_closed: true,
            ..Default::default()
        };
        assert!(!closed.is_tombstoned());
        assert!(!closed.is_active());

        let disabled = Lifecycle {
            is_disabled: true,
            ..Default::default()
        };
        assert!(disabled.is_tombstoned());

        assert!(Lifecycle::default().is_active());
    }
}
