//! Attribute schema per namespace.
//!
//! Both providers read these lists so text matching, filtering and faceting
//! behave the same whichever engine is behind the client.

use catalog_sync_shared::EntityKind;

/// Free-text attributes, in decreasing match weight.
pub fn text_attributes(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Listing => &["title", "description"],
        EntityKind::Thread => &["title", "body"],
        EntityKind::User => &["username", "displayName", "bio"],
    }
}

/// Every attribute a free-text query is matched against.
pub fn searchable_attributes(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Listing => &[
            "title",
            "description",
            "tags",
            "categoryName",
            "subCategoryName",
        ],
        EntityKind::Thread => &["title", "body", "tags", "categoryName", "subCategoryName"],
        EntityKind::User => &["username", "displayName", "bio", "city", "country"],
    }
}

/// Exact-match string attributes usable in equality and facet filters.
pub fn keyword_attributes(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Listing => &[
            "objectID",
            "currency",
            "condition",
            "saleType",
            "deliveryType",
            "categoryName",
            "subCategoryName",
            "tags",
            "city",
            "country",
            "sellerId",
        ],
        EntityKind::Thread => &[
            "objectID",
            "categoryName",
            "subCategoryName",
            "tags",
            "authorId",
        ],
        EntityKind::User => &["objectID", "city", "country", "avatarUrl"],
    }
}

/// Floating-point attributes.
pub fn decimal_attributes(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Listing => &["price"],
        EntityKind::Thread => &["budgetMin", "budgetMax"],
        EntityKind::User => &[],
    }
}

/// Integer counters shared by all kinds.
pub const COUNTER_ATTRIBUTES: [&str; 3] = ["viewCount", "likeCount", "commentCount"];

/// Epoch-millisecond timestamps shared by all kinds.
pub const TIMESTAMP_ATTRIBUTES: [&str; 2] = ["createdAt", "updatedAt"];

pub fn boolean_attributes(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Listing | EntityKind::Thread => &["isTrending", "isClosed"],
        EntityKind::User => &["isTrending", "isVerified"],
    }
}

/// Whether the namespace carries a `_geoloc` point.
pub fn has_geoloc(kind: EntityKind) -> bool {
    kind == EntityKind::User
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_attributes_are_searchable() {
        for kind in EntityKind::ALL {
            for attribute in text_attributes(kind) {
                assert!(searchable_attributes(kind).contains(attribute));
            }
        }
    }

    #[test]
    fn test_every_namespace_filters_on_object_id() {
        for kind in EntityKind::ALL {
            assert!(keyword_attributes(kind).contains(&"objectID"));
        }
    }
}
