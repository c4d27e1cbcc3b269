//! Flat search documents, one shape per index namespace.
//!
//! Every optional field serializes as `null` instead of being omitted so the
//! document shape is the same for every instance of a kind. Timestamps are
//! epoch milliseconds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityKind;

/// Search document for a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: Option<String>,
    pub condition: Option<String>,
    pub sale_type: Option<String>,
    pub delivery_type: Option<String>,
    pub category_name: Option<String>,
    pub sub_category_name: Option<String>,
    pub tags: Vec<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub seller_id: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_trending: bool,
    pub is_closed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Search document for a discussion thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub title: String,
    pub body: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub category_name: Option<String>,
    pub sub_category_name: Option<String>,
    pub tags: Vec<String>,
    pub author_id: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_trending: bool,
    pub is_closed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Geographic point in the engine's `_geoloc` convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Search document for a user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "_geoloc")]
    pub geoloc: Option<GeoPoint>,
    pub is_verified: bool,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_trending: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A document destined for one of the three namespaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchDocument {
    Listing(ListingDocument),
    Thread(ThreadDocument),
    User(UserDocument),
}

impl SearchDocument {
    pub fn kind(&self) -> EntityKind {
        match self {
            SearchDocument::Listing(_) => EntityKind::Listing,
            SearchDocument::Thread(_) => EntityKind::Thread,
            SearchDocument::User(_) => EntityKind::User,
        }
    }

    pub fn object_id(&self) -> &str {
        match self {
            SearchDocument::Listing(d) => &d.object_id,
            SearchDocument::Thread(d) => &d.object_id,
            SearchDocument::User(d) => &d.object_id,
        }
    }

    /// JSON body as sent to the engine.
    pub fn to_value(&self) -> Value {
        // Every field is a plain scalar, string, or list; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_doc() -> UserDocument {
        UserDocument {
            object_id: "u1".to_string(),
            username: "ana".to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            city: None,
            country: Some("PT".to_string()),
            geoloc: None,
            is_verified: false,
            view_count: 3,
            like_count: 0,
            comment_count: 0,
            is_trending: false,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let value = SearchDocument::User(user_doc()).to_value();

        assert_eq!(value["objectID"], "u1");
        assert!(value.get("displayName").unwrap().is_null());
        assert!(value.get("_geoloc").unwrap().is_null());
        assert_eq!(value["country"], "PT");
        assert!(value["createdAt"].is_i64());
    }

    #[test]
    fn test_kind_and_object_id() {
        let doc = SearchDocument::User(user_doc());
        assert_eq!(doc.kind(), EntityKind::User);
        assert_eq!(doc.object_id(), "u1");
    }
}
