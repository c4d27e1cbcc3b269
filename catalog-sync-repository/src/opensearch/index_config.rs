//! OpenSearch index configuration and mappings.
//!
//! This module defines the index naming scheme and the settings and mappings
//! for each catalog namespace.

use serde_json::{json, Map, Value};

use crate::schema;
use catalog_sync_shared::EntityKind;

/// Default prefix for the catalog indices.
pub const DEFAULT_INDEX_PREFIX: &str = "catalog";

/// Index naming configuration.
///
/// Each kind gets its own index named `{prefix}_{namespace}`, e.g.
/// `catalog_listings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub prefix: String,
}

impl IndexConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Full index name for a kind.
    pub fn index_name(&self, kind: EntityKind) -> String {
        format!("{}_{}", self.prefix, kind.namespace())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_PREFIX)
    }
}

/// Get the index settings and mappings for a namespace.
///
/// The configuration includes:
/// - **search_as_you_type**: Free-text attributes, with a `raw` keyword sub-field
/// - **keyword**: Facet and equality attributes, including `objectID`
/// - **double / long / date**: Numeric filter and ranking attributes
/// - **geo_point**: `_geoloc` on the user namespace
pub fn get_index_settings(kind: EntityKind) -> Value {
    let mut properties = Map::new();

    for attribute in schema::text_attributes(kind) {
        properties.insert(
            attribute.to_string(),
            json!({
                "type": "search_as_you_type",
                "fields": { "raw": { "type": "keyword" } }
            }),
        );
    }
    for attribute in schema::keyword_attributes(kind) {
        properties.insert(attribute.to_string(), json!({ "type": "keyword" }));
    }
    for attribute in schema::decimal_attributes(kind) {
        properties.insert(attribute.to_string(), json!({ "type": "double" }));
    }
    for attribute in schema::COUNTER_ATTRIBUTES {
        properties.insert(attribute.to_string(), json!({ "type": "long" }));
    }
    for attribute in schema::TIMESTAMP_ATTRIBUTES {
        properties.insert(
            attribute.to_string(),
            json!({ "type": "date", "format": "epoch_millis" }),
        );
    }
    for attribute in schema::boolean_attributes(kind) {
        properties.insert(attribute.to_string(), json!({ "type": "boolean" }));
    }
    if schema::has_geoloc(kind) {
        properties.insert("_geoloc".to_string(), json!({ "type": "geo_point" }));
    }

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": properties
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name() {
        let config = IndexConfig::default();
        assert_eq!(config.index_name(EntityKind::Listing), "catalog_listings");
        assert_eq!(
            IndexConfig::new("staging").index_name(EntityKind::User),
            "staging_users"
        );
    }

    #[test]
    fn test_listing_settings_structure() {
        let settings = get_index_settings(EntityKind::Listing);
        let properties = &settings["mappings"]["properties"];

        assert!(settings["settings"]["number_of_shards"].is_number());
        assert_eq!(properties["title"]["type"], "search_as_you_type");
        assert_eq!(properties["objectID"]["type"], "keyword");
        assert_eq!(properties["price"]["type"], "double");
        assert_eq!(properties["viewCount"]["type"], "long");
        assert_eq!(properties["createdAt"]["format"], "epoch_millis");
        assert_eq!(properties["isTrending"]["type"], "boolean");
        assert!(properties.get("_geoloc").is_none());
    }

    #[test]
    fn test_user_settings_have_geo_point() {
        let settings = get_index_settings(EntityKind::User);
        assert_eq!(
            settings["mappings"]["properties"]["_geoloc"]["type"],
            "geo_point"
        );
    }
}
