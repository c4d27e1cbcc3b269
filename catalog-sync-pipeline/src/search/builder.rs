//! Compiles `CatalogSearchParams` into one `SearchRequest` per namespace.

use catalog_sync_shared::{
    EntityKind, FacetFilter, FacetFilterGroup, Filter, GeoFilter, NumericFilter, NumericOp,
    Ranking, SearchRequest, SortDirection, DEFAULT_HITS_PER_PAGE, MAX_HITS_PER_PAGE,
};
use tracing::debug;

use super::params::{lenient_f64, lenient_usize, CatalogSearchParams};

/// Radius used when a location is given without one.
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Facets returned with each namespace's results.
pub fn facets_for(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Listing => &[
            "categoryName",
            "subCategoryName",
            "condition",
            "saleType",
            "deliveryType",
            "tags",
        ],
        EntityKind::Thread => &["categoryName", "subCategoryName", "tags"],
        EntityKind::User => &["city", "country"],
    }
}

/// Map a sort key to a ranking override.
///
/// Keys outside the allow-list, or not meaningful for the namespace, fall
/// back to relevance.
pub fn ranking_for(kind: EntityKind, sort: Option<&str>, order: Option<&str>) -> Ranking {
    let Some(sort) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ranking::Relevance;
    };

    let (attribute, default_direction) = match (sort.to_ascii_lowercase().as_str(), kind) {
        ("newest" | "createdat", _) => ("createdAt", SortDirection::Desc),
        ("views" | "viewcount", _) => ("viewCount", SortDirection::Desc),
        ("likes" | "likecount", _) => ("likeCount", SortDirection::Desc),
        ("price", EntityKind::Listing) => ("price", SortDirection::Asc),
        ("budget", EntityKind::Thread) => ("budgetMax", SortDirection::Desc),
        _ => {
            debug!(kind = %kind, sort = sort, "Sort key not allowed, using relevance");
            return Ranking::Relevance;
        }
    };

    let direction = match order.map(str::to_ascii_lowercase).as_deref() {
        Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        _ => default_direction,
    };

    Ranking::Attribute {
        attribute: attribute.to_string(),
        direction,
    }
}

fn facet_group(attribute: &str, values: &[String]) -> Option<FacetFilterGroup> {
    let group: FacetFilterGroup = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| FacetFilter::new(attribute, v))
        .collect();
    (!group.is_empty()).then_some(group)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn range(
    filters: &mut Vec<NumericFilter>,
    name: (&str, &str),
    bounds: (Option<&str>, Option<&str>),
    attributes: (&str, &str),
) {
    if let Some(min) = lenient_f64(name.0, bounds.0) {
        filters.push(NumericFilter::new(attributes.0, NumericOp::Gte, min));
    }
    if let Some(max) = lenient_f64(name.1, bounds.1) {
        filters.push(NumericFilter::new(attributes.1, NumericOp::Lte, max));
    }
}

/// Build the request for one namespace.
pub fn build_request(kind: EntityKind, params: &CatalogSearchParams) -> SearchRequest {
    let mut request = SearchRequest::new(params.query.trim());

    request.page = lenient_usize("page", params.page.as_deref()).unwrap_or(0);
    request.hits_per_page = lenient_usize("hitsPerPage", params.hits_per_page.as_deref())
        .unwrap_or(DEFAULT_HITS_PER_PAGE)
        .clamp(1, MAX_HITS_PER_PAGE);
    request.facets = facets_for(kind).iter().map(|f| f.to_string()).collect();
    request.ranking = ranking_for(kind, params.sort.as_deref(), params.order.as_deref());

    if let Some(trending) = params.trending {
        request.filters.push(Filter::boolean("isTrending", trending));
    }

    match kind {
        EntityKind::Listing | EntityKind::Thread => {
            if let Some(category) = non_empty(&params.category) {
                request.filters.push(Filter::text("categoryName", category));
            }
            if let Some(sub_category) = non_empty(&params.sub_category) {
                request
                    .filters
                    .push(Filter::text("subCategoryName", sub_category));
            }
            request
                .facet_filters
                .extend(facet_group("tags", &params.tags));
        }
        EntityKind::User => {}
    }

    match kind {
        EntityKind::Listing => {
            request.facet_filters.extend(
                [
                    facet_group("condition", &params.conditions),
                    facet_group("saleType", &params.sale_types),
                    facet_group("deliveryType", &params.delivery_types),
                ]
                .into_iter()
                .flatten(),
            );
            range(
                &mut request.numeric_filters,
                ("minPrice", "maxPrice"),
                (params.min_price.as_deref(), params.max_price.as_deref()),
                ("price", "price"),
            );
        }
        EntityKind::Thread => {
            // A thread matches when its budget range sits inside the requested one.
            range(
                &mut request.numeric_filters,
                ("minBudget", "maxBudget"),
                (params.min_budget.as_deref(), params.max_budget.as_deref()),
                ("budgetMin", "budgetMax"),
            );
        }
        EntityKind::User => {
            if let Some(verified) = params.verified {
                request.filters.push(Filter::boolean("isVerified", verified));
            }
            if let Some(city) = non_empty(&params.city) {
                request.filters.push(Filter::text("city", city));
            }
            if let Some(country) = non_empty(&params.country) {
                request.filters.push(Filter::text("country", country));
            }
            request.geo = geo_filter(params);
        }
    }

    request
}

fn geo_filter(params: &CatalogSearchParams) -> Option<GeoFilter> {
    let lat = lenient_f64("lat", params.lat.as_deref())?;
    let lng = lenient_f64("lng", params.lng.as_deref())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        debug!(lat, lng, "Coordinates out of range, ignoring location filter");
        return None;
    }
    let radius_km = lenient_f64("radius", params.radius.as_deref())
        .filter(|r| *r > 0.0)
        .unwrap_or(DEFAULT_RADIUS_KM);

    Some(GeoFilter {
        lat,
        lng,
        radius_meters: (radius_km * 1000.0).round().min(u32::MAX as f64) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_params() -> CatalogSearchParams {
        CatalogSearchParams {
            query: " road bike ".to_string(),
            category: Some("Bikes".to_string()),
            trending: Some(true),
            conditions: vec!["new".to_string(), "used".to_string()],
            tags: vec!["vintage".to_string()],
            min_price: Some("10".to_string()),
            max_price: Some("250.5".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_listing_filters_partition() {
        let request = build_request(EntityKind::Listing, &listing_params());

        assert_eq!(request.query, "road bike");
        assert_eq!(
            request.filter_expression(),
            "isTrending:true AND categoryName:\"Bikes\""
        );
        assert_eq!(
            request.facet_expression(),
            "(tags:vintage) AND (condition:new OR condition:used)"
        );
        assert_eq!(request.numeric_expression(), "price>=10 AND price<=250.5");
        assert_eq!(request.ranking, Ranking::Relevance);
    }

    #[test]
    fn test_filters_that_do_not_apply_are_ignored() {
        let request = build_request(EntityKind::User, &listing_params());

        assert_eq!(request.filter_expression(), "isTrending:true");
        assert!(request.facet_filters.is_empty());
        assert!(request.numeric_filters.is_empty());
        assert_eq!(request.facets, vec!["city".to_string(), "country".to_string()]);
    }

    #[test]
    fn test_malformed_numbers_are_absent() {
        let params = CatalogSearchParams {
            min_price: Some("cheap".to_string()),
            max_price: Some("100".to_string()),
            page: Some("two".to_string()),
            hits_per_page: Some("5000".to_string()),
            ..Default::default()
        };
        let request = build_request(EntityKind::Listing, &params);

        assert_eq!(request.numeric_expression(), "price<=100");
        assert_eq!(request.page, 0);
        assert_eq!(request.hits_per_page, MAX_HITS_PER_PAGE);
    }

    #[test]
    fn test_thread_budget_range() {
        let params = CatalogSearchParams {
            min_budget: Some("50".to_string()),
            max_budget: Some("400".to_string()),
            ..Default::default()
        };
        let request = build_request(EntityKind::Thread, &params);

        assert_eq!(
            request.numeric_expression(),
            "budgetMin>=50 AND budgetMax<=400"
        );
    }

    #[test]
    fn test_sort_allow_list() {
        assert_eq!(
            ranking_for(EntityKind::Listing, Some("price"), None),
            Ranking::Attribute {
                attribute: "price".to_string(),
                direction: SortDirection::Asc
            }
        );
        assert_eq!(
            ranking_for(EntityKind::Thread, Some("newest"), Some("ASC")),
            Ranking::Attribute {
                attribute: "createdAt".to_string(),
                direction: SortDirection::Asc
            }
        );
        assert_eq!(
            ranking_for(EntityKind::User, Some("price"), None),
            Ranking::Relevance
        );
        assert_eq!(
            ranking_for(EntityKind::Listing, Some("sellerId"), Some("asc")),
            Ranking::Relevance
        );
        assert_eq!(ranking_for(EntityKind::Listing, None, Some("asc")), Ranking::Relevance);
    }

    #[test]
    fn test_user_location_filter() {
        let params = CatalogSearchParams {
            verified: Some(true),
            city: Some("Lisbon".to_string()),
            lat: Some("38.72".to_string()),
            lng: Some("-9.14".to_string()),
            radius: Some("5".to_string()),
            ..Default::default()
        };
        let request = build_request(EntityKind::User, &params);

        assert_eq!(
            request.filter_expression(),
            "isVerified:true AND city:\"Lisbon\""
        );
        assert_eq!(
            request.geo,
            Some(GeoFilter {
                lat: 38.72,
                lng: -9.14,
                radius_meters: 5000
            })
        );

        let missing_lng = CatalogSearchParams {
            lat: Some("38.72".to_string()),
            ..Default::default()
        };
        assert_eq!(build_request(EntityKind::User, &missing_lng).geo, None);
    }
}
