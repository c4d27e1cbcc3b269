//! Environment configuration for the catalog sync binary.
//!
//! Every setting has a default, so an empty environment yields a runnable
//! local configuration.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use catalog_sync_pipeline::backfill::BackfillConfig;
use catalog_sync_pipeline::orchestrator::OrchestratorConfig;
use catalog_sync_pipeline::queue::{Backoff, JobOptions};
use catalog_sync_pipeline::trending::TrendingConfig;
use catalog_sync_repository::opensearch::DEFAULT_INDEX_PREFIX;

use crate::AppError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default catalog export loaded into the primary store.
const DEFAULT_CATALOG_PATH: &str = "catalog.json";

const DEFAULT_TRENDING_MIN_VIEWS: u64 = 10;
const DEFAULT_TRENDING_CAP: usize = 50;
const DEFAULT_TRENDING_DEBOUNCE_MS: u64 = 30_000;
const DEFAULT_TRENDING_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TRENDING_BACKOFF_MS: u64 = 1000;
const DEFAULT_TRENDING_WORKERS: usize = 4;
const DEFAULT_BACKFILL_BATCH_SIZE: usize = 100;
const DEFAULT_BACKFILL_BATCH_DELAY_MS: u64 = 1000;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::config(format!("LOG_FORMAT must be text or json, got {}", other))),
        }
    }
}

/// Settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub index_prefix: String,
    pub catalog_path: PathBuf,
    pub trending: TrendingConfig,
    pub trending_jobs: JobOptions,
    pub orchestrator: OrchestratorConfig,
    pub backfill: BackfillConfig,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_PREFIX`: index name prefix (default: catalog)
    /// - `CATALOG_PATH`: JSON catalog export (default: catalog.json)
    /// - `TRENDING_MIN_VIEWS`, `TRENDING_CAP`, `TRENDING_WINDOW_HOURS`
    /// - `TRENDING_DEBOUNCE_MS`, `TRENDING_MAX_ATTEMPTS`, `TRENDING_BACKOFF_MS`
    /// - `TRENDING_WORKERS`, `QUEUE_SNAPSHOT_PATH`
    /// - `BACKFILL_BATCH_SIZE`, `BACKFILL_BATCH_DELAY_MS`
    /// - `LOG_FORMAT`: `text` or `json`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let window = parse::<i64>(&var, "TRENDING_WINDOW_HOURS")?
            .map(|hours| {
                if hours <= 0 {
                    return Err(AppError::config("TRENDING_WINDOW_HOURS must be positive"));
                }
                chrono::Duration::try_hours(hours)
                    .ok_or_else(|| AppError::config("TRENDING_WINDOW_HOURS is out of range"))
            })
            .transpose()?;

        let attempts = parse(&var, "TRENDING_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_TRENDING_MAX_ATTEMPTS);
        if attempts == 0 {
            return Err(AppError::config("TRENDING_MAX_ATTEMPTS must be at least 1"));
        }

        let log_format = match var("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Text,
        };

        Ok(Self {
            opensearch_url: var("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            index_prefix: var("SEARCH_INDEX_PREFIX").unwrap_or_else(|| DEFAULT_INDEX_PREFIX.to_string()),
            catalog_path: var("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
            trending: TrendingConfig {
                min_views: parse(&var, "TRENDING_MIN_VIEWS")?.unwrap_or(DEFAULT_TRENDING_MIN_VIEWS),
                cap: parse(&var, "TRENDING_CAP")?.unwrap_or(DEFAULT_TRENDING_CAP),
                window,
            },
            trending_jobs: JobOptions {
                delay_ms: parse(&var, "TRENDING_DEBOUNCE_MS")?.unwrap_or(DEFAULT_TRENDING_DEBOUNCE_MS),
                attempts,
                backoff: Backoff::Exponential {
                    base_ms: parse(&var, "TRENDING_BACKOFF_MS")?.unwrap_or(DEFAULT_TRENDING_BACKOFF_MS),
                },
            },
            orchestrator: OrchestratorConfig {
                workers: parse(&var, "TRENDING_WORKERS")?.unwrap_or(DEFAULT_TRENDING_WORKERS),
                snapshot_path: var("QUEUE_SNAPSHOT_PATH").map(PathBuf::from),
            },
            backfill: BackfillConfig {
                batch_size: parse(&var, "BACKFILL_BATCH_SIZE")?.unwrap_or(DEFAULT_BACKFILL_BATCH_SIZE),
                batch_delay: Duration::from_millis(
                    parse(&var, "BACKFILL_BATCH_DELAY_MS")?.unwrap_or(DEFAULT_BACKFILL_BATCH_DELAY_MS),
                ),
            },
            log_format,
        })
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| AppError::config(format!("{} has an invalid value: {}", key, raw)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.opensearch_url, "http://localhost:9200");
        assert_eq!(settings.index_prefix, "catalog");
        assert_eq!(settings.catalog_path, PathBuf::from("catalog.json"));
        assert_eq!(settings.trending, TrendingConfig::default());
        assert_eq!(
            settings.trending_jobs,
            JobOptions {
                delay_ms: 30_000,
                attempts: 3,
                backoff: Backoff::Exponential { base_ms: 1000 },
            }
        );
        assert_eq!(settings.orchestrator.workers, 4);
        assert!(settings.orchestrator.snapshot_path.is_none());
        assert_eq!(settings.backfill.batch_size, 100);
        assert_eq!(settings.backfill.batch_delay, Duration::from_millis(1000));
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("TRENDING_MIN_VIEWS", "25"),
            ("TRENDING_CAP", "5"),
            ("TRENDING_WINDOW_HOURS", "48"),
            ("TRENDING_DEBOUNCE_MS", "0"),
            ("QUEUE_SNAPSHOT_PATH", "/tmp/trending.json"),
            ("LOG_FORMAT", "JSON"),
            ("SEARCH_INDEX_PREFIX", "  "),
        ])
        .unwrap();

        assert_eq!(settings.trending.min_views, 25);
        assert_eq!(settings.trending.cap, 5);
        assert_eq!(settings.trending.window, Some(chrono::Duration::hours(48)));
        assert_eq!(settings.trending_jobs.delay_ms, 0);
        assert_eq!(
            settings.orchestrator.snapshot_path,
            Some(PathBuf::from("/tmp/trending.json"))
        );
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.index_prefix, "catalog");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            settings(&[("TRENDING_CAP", "lots")]),
            Err(AppError::ConfigError(_))
        ));
        assert!(settings(&[("TRENDING_WINDOW_HOURS", "0")]).is_err());
        assert!(settings(&[("TRENDING_MAX_ATTEMPTS", "0")]).is_err());
        assert!(settings(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
