use std::{env, time::Duration};

use anyhow::{Context, Result};
use reqwest::Url;

use crate::convert::ConversionConfig;

/// Settings for the upstream Torznab search endpoint.
#[derive(Clone, Debug)]
pub struct IndexerConfig {
    pub base_url: Url,
    pub search_path: String,
    pub api_key: String,
    pub result_limit: usize,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub indexer: IndexerConfig,
    pub conversion: ConversionConfig,
}

impl AppConfig {
    /// Loads configuration from `MAGNETARR_*` environment variables.
    ///
    /// The indexer URL and API key have no defaults; no search can work
    /// without them, so their absence is a startup error rather than a
    /// per-request failure later.
    pub fn from_env() -> Result<Self> {
        let raw_base_url = env::var("MAGNETARR_INDEXER_URL")
            .context("MAGNETARR_INDEXER_URL must be set to the indexer base URL")?;
        let base_url = parse_root_url(&raw_base_url, "MAGNETARR_INDEXER_URL")?;

        let search_path = env::var("MAGNETARR_SEARCH_PATH").unwrap_or_else(|_| "api".to_string());

        let api_key = env::var("MAGNETARR_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .context("MAGNETARR_API_KEY must be set to the indexer API key")?;

        let result_limit = env::var("MAGNETARR_RESULT_LIMIT")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(50);

        let feed_timeout_secs = env::var("MAGNETARR_FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(10);

        let convert_timeout_secs = env::var("MAGNETARR_CONVERT_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(5);

        let convert_deadline_secs = env::var("MAGNETARR_CONVERT_DEADLINE_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(10);

        let max_concurrency = env::var("MAGNETARR_CONVERT_CONCURRENCY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(5);

        let allow_private_networks = env::var("MAGNETARR_ALLOW_PRIVATE_NETWORKS")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false);

        Ok(Self {
            indexer: IndexerConfig {
                base_url,
                search_path,
                api_key,
                result_limit,
                request_timeout: Duration::from_secs(feed_timeout_secs),
            },
            conversion: ConversionConfig {
                request_timeout: Duration::from_secs(convert_timeout_secs),
                batch_deadline: Duration::from_secs(convert_deadline_secs),
                max_concurrency,
                allow_private_networks,
            },
        })
    }
}

fn parse_root_url(value: &str, label: &str) -> Result<Url> {
    let mut normalized = value.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("{label} must be a valid URL"))
}
