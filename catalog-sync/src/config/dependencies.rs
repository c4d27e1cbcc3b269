//! Dependency initialization and wiring for catalog sync.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::Settings;
use crate::AppError;
use catalog_sync_pipeline::{
    backfill::Backfill,
    loader::IndexSynchronizer,
    orchestrator::Orchestrator,
    queue::JobQueue,
    search::FederatedSearch,
    trending::{TrendingEvaluator, TRENDING_QUEUE},
};
use catalog_sync_repository::{
    IndexConfig, OpenSearchClient, SearchIndexClient, SearchIndexProvider,
};
use catalog_sync_store::{ChangeEvent, MemoryStore, PrimaryStore};

/// Buffer of the store's change-event channel.
const CHANGE_BUFFER_SIZE: usize = 1000;

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub store: Arc<MemoryStore>,
    pub client: Arc<SearchIndexClient>,
    pub synchronizer: Arc<IndexSynchronizer>,
    pub evaluator: Arc<TrendingEvaluator>,
    pub backfill: Backfill,
    pub search: FederatedSearch,
    changes: Option<mpsc::Receiver<ChangeEvent>>,
    settings: Settings,
}

impl Dependencies {
    /// Connect to OpenSearch and load the primary store.
    ///
    /// A missing catalog file starts an empty store.
    pub async fn new(settings: &Settings) -> Result<Self, AppError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_prefix = %settings.index_prefix,
            catalog_path = %settings.catalog_path.display(),
            "Initializing dependencies"
        );

        let search_client = OpenSearchClient::new(
            &settings.opensearch_url,
            IndexConfig::new(settings.index_prefix.clone()),
        )
        .await
        .map_err(|e| AppError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        let healthy = search_client
            .health_check()
            .await
            .map_err(|e| AppError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(AppError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        let (store, changes) = if settings.catalog_path.exists() {
            let (tx, rx) = mpsc::channel(CHANGE_BUFFER_SIZE);
            (MemoryStore::load(&settings.catalog_path, Some(tx)).await?, rx)
        } else {
            warn!(
                catalog_path = %settings.catalog_path.display(),
                "Catalog file not found, starting with an empty store"
            );
            MemoryStore::with_changes(CHANGE_BUFFER_SIZE)
        };

        Ok(Self::from_parts(
            store,
            Some(changes),
            Box::new(search_client),
            settings.clone(),
        ))
    }

    /// Wire the pipeline over an already-built store and search provider.
    pub fn from_parts(
        store: MemoryStore,
        changes: Option<mpsc::Receiver<ChangeEvent>>,
        provider: Box<dyn SearchIndexProvider>,
        settings: Settings,
    ) -> Self {
        let store = Arc::new(store);
        let dyn_store: Arc<dyn PrimaryStore> = store.clone();
        let client = Arc::new(SearchIndexClient::new(provider));
        let synchronizer = Arc::new(IndexSynchronizer::new(dyn_store.clone(), client.clone()));
        let evaluator = Arc::new(
            TrendingEvaluator::new(dyn_store.clone(), settings.trending.clone())
                .with_synchronizer(synchronizer.clone()),
        );
        let backfill = Backfill::new(
            dyn_store,
            synchronizer.clone(),
            client.clone(),
            settings.backfill.clone(),
        );
        let search = FederatedSearch::new(client.clone());

        Self {
            store,
            client,
            synchronizer,
            evaluator,
            backfill,
            search,
            changes,
            settings,
        }
    }

    /// Write the store back to the catalog file so trending flags and fed
    /// mutations survive a restart.
    pub async fn persist(&self) -> Result<(), AppError> {
        self.store.save(&self.settings.catalog_path).await?;
        Ok(())
    }

    /// Build the orchestrator together with the store's change stream.
    ///
    /// The stream can only be taken once.
    pub fn orchestrator(&mut self) -> Result<(Orchestrator, mpsc::Receiver<ChangeEvent>), AppError> {
        let changes = self
            .changes
            .take()
            .ok_or_else(|| AppError::config("Change stream already taken"))?;
        let queue = Arc::new(JobQueue::new(TRENDING_QUEUE, self.settings.trending_jobs));
        let orchestrator = Orchestrator::new(
            self.synchronizer.clone(),
            self.evaluator.clone(),
            queue,
            self.settings.orchestrator.clone(),
        );
        Ok((orchestrator, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_sync_pipeline::search::CatalogSearchParams;
    use catalog_sync_repository::InMemorySearchIndex;
    use catalog_sync_store::CatalogExport;
    use catalog_sync_shared::EntityKind;

    fn settings() -> Settings {
        Settings::from_lookup(|_| None).unwrap()
    }

    const CATALOG: &str = r#"{
        "categories": [{"id": "6f1c1d7e-2d0b-4b8e-9d8a-0a6b7f0c1a01", "name": "Bikes"}],
        "listings": [{
            "id": "0b6f4c1e-8f0a-4d55-9a43-6c1f2a0d7e11",
            "seller_id": "2c7e2a3b-1d4f-4e6a-8b9c-0d1e2f3a4b5c",
            "title": "Folding commuter bike",
            "price": 180.0,
            "category_id": "6f1c1d7e-2d0b-4b8e-9d8a-0a6b7f0c1a01",
            "created_at": "2026-01-10T09:00:00Z",
            "updated_at": "2026-01-10T09:00:00Z"
        }]
    }"#;

    #[tokio::test]
    async fn test_wiring_syncs_and_searches() {
        let (store, changes) = MemoryStore::with_changes(16);
        store.import(CatalogExport::from_json(CATALOG).unwrap()).await;
        let deps = Dependencies::from_parts(
            store,
            Some(changes),
            Box::new(InMemorySearchIndex::new()),
            settings(),
        );

        let report = deps.backfill.setup().await.unwrap();
        assert_eq!(report.totals().upserted, 1);

        let results = deps.search.search(&CatalogSearchParams::new("commuter")).await;
        let listings = results.get(EntityKind::Listing).unwrap();
        assert_eq!(listings.nb_hits, 1);
        assert_eq!(listings.hits[0]["categoryName"], "Bikes");
    }

    #[tokio::test]
    async fn test_recomputed_flags_survive_reload_and_backfill() {
        let path = std::env::temp_dir().join(format!("catalog-{}.json", uuid::Uuid::new_v4()));
        let catalog = CATALOG.replace(
            r#""price": 180.0,"#,
            r#""price": 180.0, "engagement": {"view_count": 40},"#,
        );
        tokio::fs::write(&path, catalog).await.unwrap();
        let settings = Settings {
            catalog_path: path.clone(),
            ..settings()
        };

        let deps = Dependencies::from_parts(
            MemoryStore::load(&path, None).await.unwrap(),
            None,
            Box::new(InMemorySearchIndex::new()),
            settings.clone(),
        );
        let report = deps.evaluator.recompute_kind(EntityKind::Listing).await.unwrap();
        assert_eq!(report.trending, 1);
        deps.persist().await.unwrap();

        let reloaded = Dependencies::from_parts(
            MemoryStore::load(&path, None).await.unwrap(),
            None,
            Box::new(InMemorySearchIndex::new()),
            settings,
        );
        reloaded.backfill.setup().await.unwrap();

        let results = reloaded.search.search(&CatalogSearchParams::new("commuter")).await;
        let listings = results.get(EntityKind::Listing).unwrap();
        assert_eq!(listings.hits[0]["isTrending"], true);
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_change_stream_is_taken_once() {
        let (store, changes) = MemoryStore::with_changes(16);
        let mut deps = Dependencies::from_parts(
            store,
            Some(changes),
            Box::new(InMemorySearchIndex::new()),
            settings(),
        );

        assert!(deps.orchestrator().is_ok());
        assert!(matches!(deps.orchestrator(), Err(AppError::ConfigError(_))));
    }
}
