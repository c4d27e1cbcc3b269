//! # Catalog Sync Shared
//!
//! Types shared by every crate of the catalog search sync system: the
//! primary-store entities this system projects, the flat search documents
//! it writes, and the engine-neutral search request/response model.

pub mod document;
pub mod entity;
pub mod query;

pub use document::{GeoPoint, ListingDocument, SearchDocument, ThreadDocument, UserDocument};
pub use entity::{
    Engagement, Entity, EntityKind, Lifecycle, Listing, References, Thread, UserProfile,
};
pub use query::{
    FacetFilter, FacetFilterGroup, Filter, FilterValue, GeoFilter, NumericFilter, NumericOp,
    Ranking, SearchRequest, SearchResponse, SortDirection, CUSTOM_RANKING, DEFAULT_HITS_PER_PAGE,
    MAX_HITS_PER_PAGE,
};
