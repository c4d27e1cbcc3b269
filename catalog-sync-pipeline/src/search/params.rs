//! API-level search parameters.
//!
//! Numeric inputs arrive as raw strings (query-string style). Anything that
//! does not parse to a finite number is dropped with a warning rather than
//! failing the whole query.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use catalog_sync_shared::EntityKind;

/// Which namespaces a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Listings,
    Threads,
    Users,
}

impl SearchScope {
    pub fn kinds(&self) -> Vec<EntityKind> {
        match self {
            SearchScope::All => EntityKind::ALL.to_vec(),
            SearchScope::Listings => vec![EntityKind::Listing],
            SearchScope::Threads => vec![EntityKind::Thread],
            SearchScope::Users => vec![EntityKind::User],
        }
    }

    pub fn is_federated(&self) -> bool {
        matches!(self, SearchScope::All)
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchScope::All => "all",
            SearchScope::Listings => "listings",
            SearchScope::Threads => "threads",
            SearchScope::Users => "users",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(SearchScope::All),
            "listings" | "listing" => Ok(SearchScope::Listings),
            "threads" | "thread" => Ok(SearchScope::Threads),
            "users" | "user" => Ok(SearchScope::Users),
            other => Err(format!("unknown search type: {}", other)),
        }
    }
}

/// Filters accepted by the catalog search endpoint.
///
/// Filters that do not apply to a namespace are ignored for it, so one set
/// of params can drive a federated search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogSearchParams {
    pub query: String,
    #[serde(rename = "type")]
    pub scope: SearchScope,

    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub trending: Option<bool>,
    pub tags: Vec<String>,

    // listings
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub conditions: Vec<String>,
    pub sale_types: Vec<String>,
    pub delivery_types: Vec<String>,

    // threads
    pub min_budget: Option<String>,
    pub max_budget: Option<String>,

    // users
    pub verified: Option<bool>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// Kilometres around `lat`/`lng`.
    pub radius: Option<String>,

    pub page: Option<String>,
    pub hits_per_page: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl CatalogSearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Parse an optional numeric input, treating garbage as absent.
pub(crate) fn lenient_f64(name: &str, raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            warn!(param = name, value = raw, "Ignoring malformed numeric search parameter");
            None
        }
    }
}

/// Same as [`lenient_f64`] for non-negative integers.
pub(crate) fn lenient_usize(name: &str, raw: Option<&str>) -> Option<usize> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(param = name, value = raw, "Ignoring malformed numeric search parameter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parsing_drops_garbage() {
        assert_eq!(lenient_f64("minPrice", Some("12.5")), Some(12.5));
        assert_eq!(lenient_f64("minPrice", Some(" 7 ")), Some(7.0));
        assert_eq!(lenient_f64("minPrice", Some("abc")), None);
        assert_eq!(lenient_f64("minPrice", Some("NaN")), None);
        assert_eq!(lenient_f64("minPrice", Some("inf")), None);
        assert_eq!(lenient_f64("minPrice", Some("")), None);
        assert_eq!(lenient_f64("minPrice", None), None);

        assert_eq!(lenient_usize("page", Some("3")), Some(3));
        assert_eq!(lenient_usize("page", Some("-1")), None);
    }

    #[test]
    fn test_params_deserialize_from_camel_case() {
        let params: CatalogSearchParams = serde_json::from_value(serde_json::json!({
            "query": "bike",
            "type": "listings",
            "minPrice": "10",
            "saleTypes": ["fixed"]
        }))
        .unwrap();

        assert_eq!(params.scope, SearchScope::Listings);
        assert_eq!(params.min_price.as_deref(), Some("10"));
        assert_eq!(params.sale_types, vec!["fixed".to_string()]);
        assert!(params.tags.is_empty());
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("Threads".parse::<SearchScope>(), Ok(SearchScope::Threads));
        assert_eq!("user".parse::<SearchScope>(), Ok(SearchScope::Users));
        assert!("orders".parse::<SearchScope>().is_err());
        assert_eq!(SearchScope::All.kinds().len(), 3);
    }
}
