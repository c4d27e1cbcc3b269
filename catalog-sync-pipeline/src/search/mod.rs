//! Query building and federated search.
//!
//! API parameters are split per namespace into equality filters, facet
//! groups and numeric ranges, then queried concurrently.

mod builder;
mod federated;
mod params;

pub use builder::{build_request, facets_for, ranking_for, DEFAULT_RADIUS_KM};
pub use federated::{FederatedResults, FederatedSearch, FEDERATED_DISPLAY_COUNT};
pub use params::{CatalogSearchParams, SearchScope};
