//! Engine-neutral search request and response model.
//!
//! A `SearchRequest` carries three kinds of filters that engines combine as:
//! `filters` AND-ed together, each `FacetFilterGroup` OR-ed internally and
//! AND-ed with the other groups, and `numeric_filters` AND-ed as range checks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size when a caller does not ask for one.
pub const DEFAULT_HITS_PER_PAGE: usize = 20;

/// Upper bound on page size accepted from callers.
pub const MAX_HITS_PER_PAGE: usize = 100;

/// A value on the right-hand side of an equality filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FilterValue {
    /// Whether a document attribute value satisfies this equality.
    pub fn matches(&self, candidate: &Value) -> bool {
        match (self, candidate) {
            (FilterValue::Bool(b), Value::Bool(c)) => b == c,
            (FilterValue::Number(n), Value::Number(c)) => c.as_f64() == Some(*n),
            (FilterValue::Text(t), Value::String(c)) => t == c,
            (_, Value::Array(items)) => items.iter().any(|item| self.matches(item)),
            _ => false,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Number(n) => serde_json::json!(n),
            FilterValue::Text(t) => Value::String(t.clone()),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Text(t) => write!(f, "\"{}\"", t.replace('"', "\\\"")),
        }
    }
}

/// Boolean/equality filter; all of them must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub attribute: String,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(attribute: impl Into<String>, value: FilterValue) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn boolean(attribute: impl Into<String>, value: bool) -> Self {
        Self::new(attribute, FilterValue::Bool(value))
    }

    pub fn text(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(attribute, FilterValue::Text(value.into()))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.attribute, self.value)
    }
}

/// A single categorical value match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetFilter {
    pub attribute: String,
    pub value: String,
}

impl FacetFilter {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FacetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.attribute, self.value)
    }
}

/// Facet filters OR-ed together.
pub type FacetFilterGroup = Vec<FacetFilter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericOp {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
}

impl NumericOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            NumericOp::Lt => "<",
            NumericOp::Lte => "<=",
            NumericOp::Eq => "=",
            NumericOp::Gte => ">=",
            NumericOp::Gt => ">",
        }
    }

    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            NumericOp::Lt => left < right,
            NumericOp::Lte => left <= right,
            NumericOp::Eq => left == right,
            NumericOp::Gte => left >= right,
            NumericOp::Gt => left > right,
        }
    }
}

/// Numeric comparison against a document attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFilter {
    pub attribute: String,
    pub op: NumericOp,
    pub value: f64,
}

impl NumericFilter {
    pub fn new(attribute: impl Into<String>, op: NumericOp, value: f64) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            value,
        }
    }
}

impl fmt::Display for NumericFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.attribute, self.op.symbol(), self.value)
    }
}

/// Restrict hits to documents whose `_geoloc` lies within a radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// How hits are ordered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ranking {
    /// The engine's fixed relevance ranking, ending with the custom
    /// tiebreak `isTrending desc, viewCount desc, createdAt desc`.
    #[default]
    Relevance,
    /// Override relevance with a single attribute sort.
    Attribute {
        attribute: String,
        direction: SortDirection,
    },
}

/// Attributes, in order, of the custom ranking used as the final tiebreak.
pub const CUSTOM_RANKING: [(&str, SortDirection); 3] = [
    ("isTrending", SortDirection::Desc),
    ("viewCount", SortDirection::Desc),
    ("createdAt", SortDirection::Desc),
];

/// A single-namespace query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Zero-based page number.
    pub page: usize,
    pub hits_per_page: usize,
    pub filters: Vec<Filter>,
    pub facet_filters: Vec<FacetFilterGroup>,
    pub numeric_filters: Vec<NumericFilter>,
    pub geo: Option<GeoFilter>,
    pub facets: Vec<String>,
    pub ranking: Ranking,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            page: 0,
            hits_per_page: DEFAULT_HITS_PER_PAGE,
            filters: Vec::new(),
            facet_filters: Vec::new(),
            numeric_filters: Vec::new(),
            geo: None,
            facets: Vec::new(),
            ranking: Ranking::Relevance,
        }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Request that matches exactly one document by id.
    pub fn by_object_id(object_id: impl Into<String>) -> Self {
        Self {
            filters: vec![Filter::text("objectID", object_id)],
            ..Default::default()
        }
    }

    /// Equality filters rendered as `a:x AND b:y`.
    pub fn filter_expression(&self) -> String {
        self.filters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Facet groups rendered as `(a:x OR a:y) AND (b:z)`.
    pub fn facet_expression(&self) -> String {
        self.facet_filters
            .iter()
            .filter(|group| !group.is_empty())
            .map(|group| {
                let inner = group
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("({})", inner)
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Numeric filters rendered as `price>=10 AND price<=20`.
    pub fn numeric_expression(&self) -> String {
        self.numeric_filters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Offset of the first hit of the requested page.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.hits_per_page)
    }
}

/// Result of a single-namespace query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<Value>,
    pub nb_hits: usize,
    pub nb_pages: usize,
    pub page: usize,
    pub hits_per_page: usize,
    /// Facet attribute -> value -> count.
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
    pub processing_time_ms: u64,
}

impl SearchResponse {
    /// Empty response for a request, used when the engine call fails.
    pub fn empty(request: &SearchRequest) -> Self {
        Self {
            page: request.page,
            hits_per_page: request.hits_per_page,
            ..Default::default()
        }
    }

    /// Number of pages needed for `nb_hits` at `hits_per_page`.
    pub fn page_count(nb_hits: usize, hits_per_page: usize) -> usize {
        if hits_per_page == 0 {
            return 0;
        }
        nb_hits.div_ceil(hits_per_page)
    }

    /// Keep only the first `limit` hits. Totals are left untouched.
    pub fn truncate_hits(&mut self, limit: usize) {
        self.hits.truncate(limit);
    }

    /// `objectID`s of the hits, in order.
    pub fn object_ids(&self) -> Vec<String> {
        self.hits
            .iter()
            .filter_map(|hit| hit.get("objectID").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}
