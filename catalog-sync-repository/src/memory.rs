//! In-memory search index.
//!
//! Mirrors the OpenSearch provider's filter, facet and ranking semantics on
//! plain JSON documents. Used for local runs without a cluster and as the
//! engine behind pipeline tests.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::schema;
use crate::types::{BatchOperationResult, BatchOperationSummary};
use catalog_sync_shared::query::CUSTOM_RANKING;
use catalog_sync_shared::{
    EntityKind, FacetFilter, GeoFilter, Ranking, SearchDocument, SearchRequest, SearchResponse,
    SortDirection,
};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Default)]
struct Namespaces {
    documents: HashMap<EntityKind, BTreeMap<String, Value>>,
    configured: HashSet<EntityKind>,
}

/// Search index held in process memory, keyed by namespace then `objectID`.
#[derive(Default)]
pub struct InMemorySearchIndex {
    state: RwLock<Namespaces>,
    failing: AtomicBool,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SearchIndexError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(SearchIndexError::connection("search index unavailable"));
        }
        Ok(())
    }

    /// Stored document, if any.
    pub async fn document(&self, kind: EntityKind, object_id: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .documents
            .get(&kind)
            .and_then(|docs| docs.get(object_id))
            .cloned()
    }

    /// Every stored document of a namespace, ordered by `objectID`.
    pub async fn documents(&self, kind: EntityKind) -> Vec<Value> {
        self.state
            .read()
            .await
            .documents
            .get(&kind)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, kind: EntityKind) -> usize {
        self.state
            .read()
            .await
            .documents
            .get(&kind)
            .map_or(0, BTreeMap::len)
    }

    pub async fn is_configured(&self, kind: EntityKind) -> bool {
        self.state.read().await.configured.contains(&kind)
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn save_object(
        &self,
        kind: EntityKind,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .documents
            .entry(kind)
            .or_default()
            .insert(document.object_id().to_string(), document.to_value());
        Ok(())
    }

    async fn save_objects(
        &self,
        kind: EntityKind,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let namespace = state.documents.entry(kind).or_default();

        let results = documents
            .iter()
            .map(|document| {
                namespace.insert(document.object_id().to_string(), document.to_value());
                BatchOperationResult::succeeded(document.object_id())
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }

    async fn delete_object(
        &self,
        kind: EntityKind,
        object_id: &str,
    ) -> Result<(), SearchIndexError> {
        self.check_available()?;
        if let Some(namespace) = self.state.write().await.documents.get_mut(&kind) {
            namespace.remove(object_id);
        }
        Ok(())
    }

    async fn clear_index(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        self.check_available()?;
        self.state.write().await.documents.remove(&kind);
        debug!(namespace = %kind, "In-memory namespace cleared");
        Ok(())
    }

    async fn configure_index(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.configured.insert(kind);
        state.documents.entry(kind).or_default();
        Ok(())
    }

    async fn search(
        &self,
        kind: EntityKind,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchIndexError> {
        self.check_available()?;
        let started = Instant::now();
        let state = self.state.read().await;

        let words = query_words(&request.query);
        let mut matched: Vec<(u64, &Value)> = state
            .documents
            .get(&kind)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|doc| passes_filters(doc, request))
            .filter_map(|doc| text_score(kind, doc, &words).map(|score| (score, doc)))
            .collect();

        let facets = count_facets(&request.facets, matched.iter().map(|(_, doc)| *doc));

        matched.sort_by(|a, b| compare_hits(&request.ranking, a, b));

        let nb_hits = matched.len();
        let hits = matched
            .into_iter()
            .skip(request.offset())
            .take(request.hits_per_page)
            .map(|(_, doc)| doc.clone())
            .collect();

        Ok(SearchResponse {
            hits,
            nb_hits,
            nb_pages: SearchResponse::page_count(nb_hits, request.hits_per_page),
            page: request.page,
            hits_per_page: request.hits_per_page,
            facets,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        Ok(!self.failing.load(AtomicOrdering::SeqCst))
    }
}

fn query_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Lowercased string values of an attribute, flattening arrays.
fn attribute_strings(doc: &Value, attribute: &str) -> Vec<String> {
    match doc.get(attribute) {
        Some(Value::String(s)) => vec![s.to_lowercase()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect(),
        _ => Vec::new(),
    }
}

/// Every query word must occur in some searchable attribute. Earlier
/// attributes weigh more, and whole-word matches beat partial ones.
/// Returns `None` when the document does not match.
fn text_score(kind: EntityKind, doc: &Value, words: &[String]) -> Option<u64> {
    if words.is_empty() {
        return Some(0);
    }

    let attributes = schema::searchable_attributes(kind);
    let mut total = 0u64;

    for word in words {
        let mut best = 0u64;
        for (position, attribute) in attributes.iter().enumerate() {
            let weight = (attributes.len() - position) as u64;
            for text in attribute_strings(doc, attribute) {
                let score = if text.split_whitespace().any(|token| token == word) {
                    weight * 2
                } else if text.contains(word.as_str()) {
                    weight
                } else {
                    0
                };
                best = best.max(score);
            }
        }
        if best == 0 {
            return None;
        }
        total += best;
    }

    Some(total)
}

fn passes_filters(doc: &Value, request: &SearchRequest) -> bool {
    let equality = request.filters.iter().all(|filter| {
        doc.get(&filter.attribute)
            .is_some_and(|value| filter.value.matches(value))
    });

    let facets = request
        .facet_filters
        .iter()
        .filter(|group| !group.is_empty())
        .all(|group| group.iter().any(|facet| facet_matches(doc, facet)));

    let numeric = request.numeric_filters.iter().all(|filter| {
        doc.get(&filter.attribute)
            .and_then(Value::as_f64)
            .is_some_and(|value| filter.op.holds(value, filter.value))
    });

    let geo = request.geo.map_or(true, |geo| within_radius(doc, &geo));

    equality && facets && numeric && geo
}

fn facet_matches(doc: &Value, facet: &FacetFilter) -> bool {
    doc.get(&facet.attribute)
        .map(facet_values)
        .is_some_and(|values| values.iter().any(|v| *v == facet.value))
}

/// String forms of a facetable value. Nulls have none.
fn facet_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(facet_values).collect(),
        _ => Vec::new(),
    }
}

fn count_facets<'a>(
    attributes: &[String],
    docs: impl Iterator<Item = &'a Value>,
) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut counts: BTreeMap<String, BTreeMap<String, u64>> = attributes
        .iter()
        .map(|attribute| (attribute.clone(), BTreeMap::new()))
        .collect();

    for doc in docs {
        for (attribute, buckets) in counts.iter_mut() {
            if let Some(value) = doc.get(attribute) {
                for key in facet_values(value) {
                    *buckets.entry(key).or_insert(0) += 1;
                }
            }
        }
    }

    counts
}

fn within_radius(doc: &Value, geo: &GeoFilter) -> bool {
    let point = doc.get("_geoloc");
    let lat = point.and_then(|p| p.get("lat")).and_then(Value::as_f64);
    let lng = point.and_then(|p| p.get("lng")).and_then(Value::as_f64);

    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            haversine_meters(geo.lat, geo.lng, lat, lng) <= f64::from(geo.radius_meters)
        }
        _ => false,
    }
}

fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn compare_attribute(attribute: &str, direction: SortDirection, a: &Value, b: &Value) -> Ordering {
    let left = a.get(attribute).filter(|v| !v.is_null());
    let right = b.get(attribute).filter(|v| !v.is_null());

    match (left, right) {
        (Some(x), Some(y)) => match direction {
            SortDirection::Asc => compare_values(x, y),
            SortDirection::Desc => compare_values(y, x),
        },
        // Missing values sort last in either direction.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_hits(ranking: &Ranking, a: &(u64, &Value), b: &(u64, &Value)) -> Ordering {
    let (score_a, doc_a) = a;
    let (score_b, doc_b) = b;

    let primary = match ranking {
        Ranking::Relevance => Ordering::Equal,
        Ranking::Attribute {
            attribute,
            direction,
        } => compare_attribute(attribute, *direction, doc_a, doc_b),
    };

    primary
        .then_with(|| score_b.cmp(score_a))
        .then_with(|| {
            CUSTOM_RANKING
                .iter()
                .map(|(attribute, direction)| {
                    compare_attribute(attribute, *direction, doc_a, doc_b)
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| compare_attribute("objectID", SortDirection::Asc, doc_a, doc_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_sync_shared::{
        Filter, GeoPoint, ListingDocument, NumericFilter, NumericOp, UserDocument,
    };

    fn listing(id: &str, title: &str, views: u64) -> SearchDocument {
        SearchDocument::Listing(ListingDocument {
            object_id: id.to_string(),
            title: title.to_string(),
            description: None,
            price: 10.0 * views as f64,
            currency: Some("EUR".to_string()),
            condition: Some(if views % 2 == 0 { "new" } else { "used" }.to_string()),
            sale_type: None,
            delivery_type: None,
            category_name: Some("Bikes".to_string()),
            sub_category_name: None,
            tags: vec!["vintage".to_string()],
            city: None,
            country: None,
            seller_id: "seller".to_string(),
            view_count: views,
            like_count: 0,
            comment_count: 0,
            is_trending: false,
            is_closed: false,
            created_at: 1_000,
            updated_at: 1_000,
        })
    }

    fn user(id: &str, lat: f64, lng: f64) -> SearchDocument {
        SearchDocument::User(UserDocument {
            object_id: id.to_string(),
            username: id.to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            city: None,
            country: None,
            geoloc: Some(GeoPoint { lat, lng }),
            is_verified: false,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            is_trending: false,
            created_at: 0,
            updated_at: 0,
        })
    }

    async fn seeded() -> InMemorySearchIndex {
        let index = InMemorySearchIndex::new();
        let docs = vec![
            listing("a", "Red road bike", 5),
            listing("b", "Blue mountain bike", 12),
            listing("c", "Bike helmet", 2),
            listing("d", "Wooden table", 40),
        ];
        index.save_objects(EntityKind::Listing, &docs).await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_save_replaces_by_object_id() {
        let index = InMemorySearchIndex::new();
        index
            .save_object(EntityKind::Listing, &listing("a", "Old", 1))
            .await
            .unwrap();
        index
            .save_object(EntityKind::Listing, &listing("a", "New", 1))
            .await
            .unwrap();

        assert_eq!(index.len(EntityKind::Listing).await, 1);
        let stored = index.document(EntityKind::Listing, "a").await.unwrap();
        assert_eq!(stored["title"], "New");
    }

    #[tokio::test]
    async fn test_text_query_requires_every_word() {
        let index = seeded().await;
        let response = index
            .search(EntityKind::Listing, &SearchRequest::new("bike red"))
            .await
            .unwrap();

        assert_eq!(response.object_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_ties_break_on_custom_ranking() {
        let index = seeded().await;
        let response = index
            .search(EntityKind::Listing, &SearchRequest::new("bike"))
            .await
            .unwrap();

        // a, b and c match "bike" as a title word and tie on relevance, so
        // views decide; d only matches through its category name.
        assert_eq!(response.object_ids(), vec!["b", "a", "c", "d"]);
        assert_eq!(response.nb_hits, 4);
    }

    #[tokio::test]
    async fn test_object_id_filter() {
        let index = seeded().await;
        let response = index
            .search(EntityKind::Listing, &SearchRequest::by_object_id("c"))
            .await
            .unwrap();

        assert_eq!(response.object_ids(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_facet_groups_and_numeric_filters() {
        let index = seeded().await;
        let request = SearchRequest {
            facet_filters: vec![vec![
                FacetFilter::new("condition", "new"),
                FacetFilter::new("condition", "used"),
            ]],
            numeric_filters: vec![NumericFilter::new("price", NumericOp::Gte, 50.0)],
            filters: vec![Filter::text("categoryName", "Bikes")],
            facets: vec!["condition".to_string()],
            ..Default::default()
        };

        let response = index.search(EntityKind::Listing, &request).await.unwrap();

        let mut ids = response.object_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "d"]);
        assert_eq!(response.facets["condition"]["new"], 2);
        assert_eq!(response.facets["condition"]["used"], 1);
    }

    #[tokio::test]
    async fn test_attribute_ranking_and_pagination() {
        let index = seeded().await;
        let request = SearchRequest {
            ranking: Ranking::Attribute {
                attribute: "price".to_string(),
                direction: SortDirection::Asc,
            },
            page: 1,
            hits_per_page: 2,
            ..Default::default()
        };

        let response = index.search(EntityKind::Listing, &request).await.unwrap();

        assert_eq!(response.object_ids(), vec!["b", "d"]);
        assert_eq!(response.nb_hits, 4);
        assert_eq!(response.nb_pages, 2);
    }

    #[tokio::test]
    async fn test_geo_radius() {
        let index = InMemorySearchIndex::new();
        index
            .save_objects(
                EntityKind::User,
                &[user("lisbon", 38.7223, -9.1393), user("porto", 41.1579, -8.6291)],
            )
            .await
            .unwrap();

        let request = SearchRequest {
            geo: Some(GeoFilter {
                lat: 38.7,
                lng: -9.1,
                radius_meters: 50_000,
            }),
            ..Default::default()
        };

        let response = index.search(EntityKind::User, &request).await.unwrap();
        assert_eq!(response.object_ids(), vec!["lisbon"]);
    }

    #[tokio::test]
    async fn test_clear_delete_and_failure() {
        let index = seeded().await;

        index.delete_object(EntityKind::Listing, "a").await.unwrap();
        index.delete_object(EntityKind::Listing, "missing").await.unwrap();
        assert_eq!(index.len(EntityKind::Listing).await, 3);

        index.clear_index(EntityKind::Listing).await.unwrap();
        assert_eq!(index.len(EntityKind::Listing).await, 0);

        index.set_failing(true);
        assert!(!index.health_check().await.unwrap());
        assert!(index
            .search(EntityKind::Listing, &SearchRequest::default())
            .await
            .is_err());
    }

    #[test]
    fn test_haversine() {
        let d = haversine_meters(38.7223, -9.1393, 41.1579, -8.6291);
        assert!((270_000.0..280_000.0).contains(&d));
    }
}
