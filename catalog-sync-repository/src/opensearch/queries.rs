//! OpenSearch query builders.
//!
//! This module compiles an engine-neutral `SearchRequest` into an OpenSearch
//! search body and parses the response back.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::errors::SearchIndexError;
use crate::schema;
use catalog_sync_shared::query::CUSTOM_RANKING;
use catalog_sync_shared::{
    EntityKind, FacetFilterGroup, Filter, NumericFilter, NumericOp, Ranking, SearchRequest,
    SearchResponse,
};

/// Number of buckets returned per facet.
const FACET_BUCKET_SIZE: usize = 100;

/// Build the OpenSearch search body for a request.
///
/// The body handles:
/// - Free-text matching with prefix, fuzzy and phrase-prefix clauses
/// - Equality filters as `term` clauses in the `filter` context
/// - Facet groups as nested `bool.should` clauses (OR within, AND across)
/// - Numeric filters as `range` clauses
/// - Optional `geo_distance` restriction
/// - Sorting by relevance plus custom ranking, or by an override attribute
/// - `terms` aggregations for requested facets
pub fn build_search_body(kind: EntityKind, request: &SearchRequest) -> Value {
    let must = if request.query.trim().is_empty() {
        json!({ "match_all": {} })
    } else {
        build_text_query(kind, request.query.trim())
    };

    let mut filter: Vec<Value> = request.filters.iter().map(build_term_filter).collect();
    filter.extend(
        request
            .facet_filters
            .iter()
            .filter(|group| !group.is_empty())
            .map(build_facet_group),
    );
    filter.extend(request.numeric_filters.iter().map(build_range_filter));
    if let Some(geo) = request.geo {
        filter.push(json!({
            "geo_distance": {
                "distance": format!("{}m", geo.radius_meters),
                "_geoloc": { "lat": geo.lat, "lon": geo.lng }
            }
        }));
    }

    let mut body = json!({
        "from": request.offset(),
        "size": request.hits_per_page,
        "track_total_hits": true,
        "query": {
            "bool": {
                "must": [must],
                "filter": filter
            }
        },
        "sort": build_sort(&request.ranking)
    });

    if !request.facets.is_empty() {
        let mut aggs = Map::new();
        for facet in &request.facets {
            aggs.insert(
                facet.clone(),
                json!({ "terms": { "field": facet, "size": FACET_BUCKET_SIZE } }),
            );
        }
        body["aggs"] = Value::Object(aggs);
    }

    body
}

/// Build the free-text query for a namespace.
///
/// Uses:
/// - `multi_match` with `bool_prefix` type over the `search_as_you_type` sub-fields
/// - Fuzzy `multi_match` for typo tolerance (AUTO fuzziness) over all searchable attributes
/// - `match_phrase_prefix` on the primary text attribute for exact-prefix boosting
fn build_text_query(kind: EntityKind, query_text: &str) -> Value {
    let text = schema::text_attributes(kind);
    let primary = text[0];

    let mut prefix_fields = Vec::new();
    for (position, attribute) in text.iter().enumerate() {
        let boost = if position == 0 { "^1.5" } else { "" };
        prefix_fields.push(format!("{}{}", attribute, boost));
        prefix_fields.push(format!("{}._2gram{}", attribute, boost));
        prefix_fields.push(format!("{}._3gram{}", attribute, boost));
    }

    json!({
        "bool": {
            "should": [
                {
                    "multi_match": {
                        "query": query_text,
                        "type": "bool_prefix",
                        "fields": prefix_fields
                    }
                },
                {
                    // AUTO fuzziness: 0 edits up to 2 chars, 1 up to 5, 2 beyond
                    "multi_match": {
                        "query": query_text,
                        "fields": schema::searchable_attributes(kind),
                        "fuzziness": "AUTO",
                        "boost": 0.6
                    }
                },
                {
                    "match_phrase_prefix": {
                        primary: {
                            "query": query_text,
                            "boost": 2.0
                        }
                    }
                }
            ],
            "minimum_should_match": 1
        }
    })
}

fn build_term_filter(filter: &Filter) -> Value {
    // objectID doubles as the document _id
    if filter.attribute == "objectID" {
        return json!({ "ids": { "values": [filter.value.to_json()] } });
    }
    json!({ "term": { filter.attribute.as_str(): filter.value.to_json() } })
}

fn build_facet_group(group: &FacetFilterGroup) -> Value {
    let should: Vec<Value> = group
        .iter()
        .map(|facet| json!({ "term": { facet.attribute.as_str(): facet.value } }))
        .collect();

    json!({
        "bool": {
            "should": should,
            "minimum_should_match": 1
        }
    })
}

fn build_range_filter(filter: &NumericFilter) -> Value {
    let attribute = filter.attribute.as_str();
    let value = filter.value;
    match filter.op {
        NumericOp::Eq => json!({ "term": { attribute: value } }),
        NumericOp::Lt => json!({ "range": { attribute: { "lt": value } } }),
        NumericOp::Lte => json!({ "range": { attribute: { "lte": value } } }),
        NumericOp::Gte => json!({ "range": { attribute: { "gte": value } } }),
        NumericOp::Gt => json!({ "range": { attribute: { "gt": value } } }),
    }
}

/// Sort clauses. Relevance keeps `_score` first and finishes with the custom
/// ranking; an override puts its attribute first.
fn build_sort(ranking: &Ranking) -> Value {
    let mut sort = Vec::new();
    match ranking {
        Ranking::Relevance => sort.push(json!("_score")),
        Ranking::Attribute {
            attribute,
            direction,
        } => {
            sort.push(json!({
                attribute.as_str(): { "order": direction.as_str(), "missing": "_last" }
            }));
            sort.push(json!("_score"));
        }
    }
    for (attribute, direction) in CUSTOM_RANKING {
        sort.push(json!({ attribute: { "order": direction.as_str() } }));
    }
    Value::Array(sort)
}

/// Convert a stored `_source` back to the document convention (`_geoloc.lng`).
pub fn source_to_hit(mut source: Value) -> Value {
    if let Some(geo) = source.get_mut("_geoloc").and_then(Value::as_object_mut) {
        if let Some(lon) = geo.remove("lon") {
            geo.insert("lng".to_string(), lon);
        }
    }
    source
}

/// Convert a document body to what OpenSearch's `geo_point` accepts (`_geoloc.lon`).
pub fn document_to_source(mut body: Value) -> Value {
    if let Some(geo) = body.get_mut("_geoloc").and_then(Value::as_object_mut) {
        if let Some(lng) = geo.remove("lng") {
            geo.insert("lon".to_string(), lng);
        }
    }
    body
}

/// Parse an OpenSearch search response.
pub fn parse_search_response(
    request: &SearchRequest,
    body: &Value,
) -> Result<SearchResponse, SearchIndexError> {
    let hits_section = body
        .get("hits")
        .ok_or_else(|| SearchIndexError::parse("response has no hits section"))?;

    let nb_hits = hits_section
        .get("total")
        .and_then(|total| total.get("value").or(Some(total)))
        .and_then(Value::as_u64)
        .ok_or_else(|| SearchIndexError::parse("response has no hit total"))? as usize;

    let hits = hits_section
        .get("hits")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|hit| hit.get("_source").cloned())
                .map(source_to_hit)
                .collect()
        })
        .unwrap_or_default();

    let mut facets = BTreeMap::new();
    if let Some(aggregations) = body.get("aggregations").and_then(Value::as_object) {
        for (facet, aggregation) in aggregations {
            let mut counts = BTreeMap::new();
            for bucket in aggregation
                .get("buckets")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let key = match bucket.get("key_as_string").or_else(|| bucket.get("key")) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => continue,
                };
                let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                counts.insert(key, count);
            }
            facets.insert(facet.clone(), counts);
        }
    }

    Ok(SearchResponse {
        hits,
        nb_hits,
        nb_pages: SearchResponse::page_count(nb_hits, request.hits_per_page),
        page: request.page,
        hits_per_page: request.hits_per_page,
        facets,
        processing_time_ms: body.get("took").and_then(Value::as_u64).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_sync_shared::{FacetFilter, GeoFilter, SortDirection};

    #[test]
    fn test_empty_query_matches_all() {
        let body = build_search_body(EntityKind::Listing, &SearchRequest::default());

        assert!(body["query"]["bool"]["must"][0]["match_all"].is_object());
        assert_eq!(body["from"], 0);
        assert_eq!(body["size"], 20);
    }

    #[test]
    fn test_build_text_query() {
        let query = build_text_query(EntityKind::Thread, "bike");

        let should = query["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 3);
        assert_eq!(should[0]["multi_match"]["type"], "bool_prefix");
        assert_eq!(should[1]["multi_match"]["fuzziness"], "AUTO");
        assert!(should[2]["match_phrase_prefix"]["title"].is_object());

        let fields = should[0]["multi_match"]["fields"].as_array().unwrap();
        assert!(fields.contains(&json!("title^1.5")));
        assert!(fields.contains(&json!("body._3gram")));
    }

    #[test]
    fn test_filters_compile_into_filter_context() {
        let request = SearchRequest {
            query: "lamp".to_string(),
            page: 2,
            hits_per_page: 10,
            filters: vec![Filter::boolean("isTrending", true)],
            facet_filters: vec![vec![
                FacetFilter::new("condition", "new"),
                FacetFilter::new("condition", "used"),
            ]],
            numeric_filters: vec![
                NumericFilter::new("price", NumericOp::Gte, 5.0),
                NumericFilter::new("price", NumericOp::Lte, 50.0),
            ],
            ..Default::default()
        };

        let body = build_search_body(EntityKind::Listing, &request);
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();

        assert_eq!(body["from"], 20);
        assert_eq!(filter.len(), 4);
        assert_eq!(filter[0]["term"]["isTrending"], true);
        assert_eq!(
            filter[1]["bool"]["should"].as_array().unwrap().len(),
            2
        );
        assert_eq!(filter[1]["bool"]["minimum_should_match"], 1);
        assert_eq!(filter[2]["range"]["price"]["gte"], 5.0);
        assert_eq!(filter[3]["range"]["price"]["lte"], 50.0);
    }

    #[test]
    fn test_object_id_filter_uses_ids_query() {
        let body = build_search_body(EntityKind::User, &SearchRequest::by_object_id("abc"));
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filter[0]["ids"]["values"][0], "abc");
    }

    #[test]
    fn test_geo_filter() {
        let request = SearchRequest {
            geo: Some(GeoFilter {
                lat: 38.7,
                lng: -9.1,
                radius_meters: 5000,
            }),
            ..Default::default()
        };
        let body = build_search_body(EntityKind::User, &request);
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filter[0]["geo_distance"]["distance"], "5000m");
        assert_eq!(filter[0]["geo_distance"]["_geoloc"]["lon"], -9.1);
    }

    #[test]
    fn test_relevance_sort_ends_with_custom_ranking() {
        let body = build_search_body(EntityKind::Thread, &SearchRequest::default());
        let sort = body["sort"].as_array().unwrap();

        assert_eq!(sort[0], "_score");
        assert_eq!(sort[1]["isTrending"]["order"], "desc");
        assert_eq!(sort[2]["viewCount"]["order"], "desc");
        assert_eq!(sort[3]["createdAt"]["order"], "desc");
    }

    #[test]
    fn test_attribute_sort_override() {
        let request = SearchRequest {
            ranking: Ranking::Attribute {
                attribute: "price".to_string(),
                direction: SortDirection::Asc,
            },
            ..Default::default()
        };
        let body = build_search_body(EntityKind::Listing, &request);
        let sort = body["sort"].as_array().unwrap();

        assert_eq!(sort[0]["price"]["order"], "asc");
        assert_eq!(sort[1], "_score");
    }

    #[test]
    fn test_facet_aggregations() {
        let request = SearchRequest {
            facets: vec!["condition".to_string(), "tags".to_string()],
            ..Default::default()
        };
        let body = build_search_body(EntityKind::Listing, &request);
        assert_eq!(body["aggs"]["condition"]["terms"]["field"], "condition");
        assert_eq!(body["aggs"]["tags"]["terms"]["size"], 100);
    }

    #[test]
    fn test_parse_search_response() {
        let request = SearchRequest {
            hits_per_page: 2,
            ..Default::default()
        };
        let body = json!({
            "took": 7,
            "hits": {
                "total": { "value": 5, "relation": "eq" },
                "hits": [
                    { "_id": "a", "_source": { "objectID": "a", "_geoloc": { "lat": 1.0, "lon": 2.0 } } },
                    { "_id": "b", "_source": { "objectID": "b" } }
                ]
            },
            "aggregations": {
                "isTrending": { "buckets": [ { "key": 1, "key_as_string": "true", "doc_count": 3 } ] },
                "tags": { "buckets": [ { "key": "retro", "doc_count": 2 } ] }
            }
        });

        let response = parse_search_response(&request, &body).unwrap();

        assert_eq!(response.nb_hits, 5);
        assert_eq!(response.nb_pages, 3);
        assert_eq!(response.processing_time_ms, 7);
        assert_eq!(response.object_ids(), vec!["a", "b"]);
        assert_eq!(response.hits[0]["_geoloc"]["lng"], 2.0);
        assert_eq!(response.facets["isTrending"]["true"], 3);
        assert_eq!(response.facets["tags"]["retro"], 2);
    }

    #[test]
    fn test_parse_search_response_invalid() {
        let result = parse_search_response(&SearchRequest::default(), &json!({ "error": "x" }));
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }

    #[test]
    fn test_document_to_source_renames_lng() {
        let body = document_to_source(json!({ "_geoloc": { "lat": 1.0, "lng": 2.0 } }));
        assert_eq!(body["_geoloc"]["lon"], 2.0);
        assert!(body["_geoloc"].get("lng").is_none());
    }
}
