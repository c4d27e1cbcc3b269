//! Federated search across the listing, thread and user namespaces.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, instrument};

use catalog_sync_repository::SearchIndexClient;
use catalog_sync_shared::{EntityKind, SearchResponse};

use super::builder::build_request;
use super::params::CatalogSearchParams;

/// Hits kept per namespace when searching everything at once.
pub const FEDERATED_DISPLAY_COUNT: usize = 10;

/// Results keyed by namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FederatedResults {
    pub results: BTreeMap<EntityKind, SearchResponse>,
}

impl FederatedResults {
    pub fn get(&self, kind: EntityKind) -> Option<&SearchResponse> {
        self.results.get(&kind)
    }

    /// Sum of `nb_hits` over every namespace searched.
    pub fn total_hits(&self) -> usize {
        self.results.values().map(|r| r.nb_hits).sum()
    }
}

/// Fans a catalog query out across namespaces.
pub struct FederatedSearch {
    client: Arc<SearchIndexClient>,
}

impl FederatedSearch {
    pub fn new(client: Arc<SearchIndexClient>) -> Self {
        Self { client }
    }

    /// Search one or every namespace.
    ///
    /// Namespaces are queried concurrently. A failing namespace contributes
    /// an empty response instead of failing the search. In federated mode
    /// each namespace's hits are cut to `FEDERATED_DISPLAY_COUNT`; totals
    /// still reflect every match.
    #[instrument(skip(self, params), fields(query = %params.query, scope = %params.scope))]
    pub async fn search(&self, params: &CatalogSearchParams) -> FederatedResults {
        let federated = params.scope.is_federated();

        let searches = params.scope.kinds().into_iter().map(|kind| {
            let request = build_request(kind, params);
            async move {
                let mut response = match self.client.search(kind, &request).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!(kind = %kind, error = %e, "Search failed, returning no hits");
                        SearchResponse::empty(&request)
                    }
                };
                if federated {
                    response.truncate_hits(FEDERATED_DISPLAY_COUNT);
                }
                (kind, response)
            }
        });

        FederatedResults {
            results: join_all(searches).await.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchScope;
    use crate::testing::{listing, thread, user, Harness};

    async fn seeded(listings: u64, threads: u64) -> Harness {
        let harness = Harness::new();
        let listings: Vec<_> = (0..listings).map(listing).collect();
        let threads: Vec<_> = (0..threads).map(thread).collect();
        harness
            .synchronizer
            .batch_upsert(EntityKind::Listing, &listings)
            .await;
        harness
            .synchronizer
            .batch_upsert(EntityKind::Thread, &threads)
            .await;
        harness
            .synchronizer
            .batch_upsert(EntityKind::User, &[user(0)])
            .await;
        harness
    }

    #[tokio::test]
    async fn test_federated_truncates_each_kind() {
        let harness = seeded(25, 25).await;
        let search = FederatedSearch::new(harness.client.clone());

        let results = search.search(&CatalogSearchParams::new("bike")).await;

        let listings = results.get(EntityKind::Listing).unwrap();
        let threads = results.get(EntityKind::Thread).unwrap();
        assert_eq!(listings.hits.len(), 10);
        assert_eq!(threads.hits.len(), 10);
        assert_eq!(listings.nb_hits, 25);
        assert_eq!(threads.nb_hits, 25);
        assert_eq!(results.get(EntityKind::User).unwrap().nb_hits, 0);
    }

    #[tokio::test]
    async fn test_single_scope_is_not_truncated() {
        let harness = seeded(25, 25).await;
        let search = FederatedSearch::new(harness.client.clone());

        let params = CatalogSearchParams::new("bike").with_scope(SearchScope::Listings);
        let results = search.search(&params).await;

        assert_eq!(results.results.len(), 1);
        assert_eq!(results.get(EntityKind::Listing).unwrap().hits.len(), 20);
        assert_eq!(results.get(EntityKind::Listing).unwrap().nb_pages, 2);
    }

    #[tokio::test]
    async fn test_failing_engine_yields_empty_results() {
        let harness = seeded(3, 3).await;
        harness.index.set_failing(true);
        let search = FederatedSearch::new(harness.client.clone());

        let results = search.search(&CatalogSearchParams::new("bike")).await;

        assert_eq!(results.results.len(), 3);
        assert_eq!(results.total_hits(), 0);
        assert!(results.results.values().all(|r| r.hits.is_empty()));
    }

    #[tokio::test]
    async fn test_default_ranking_puts_trending_first() {
        let harness = Harness::new();
        let plain = listing(100);
        let mut hot = listing(5);
        hot.set_trending(true);
        harness
            .synchronizer
            .batch_upsert(EntityKind::Listing, &[plain.clone(), hot.clone()])
            .await;
        let search = FederatedSearch::new(harness.client.clone());

        let results = search
            .search(&CatalogSearchParams::new("bike").with_scope(SearchScope::Listings))
            .await;

        assert_eq!(
            results.get(EntityKind::Listing).unwrap().object_ids(),
            vec![hot.id().to_string(), plain.id().to_string()]
        );
    }
}
