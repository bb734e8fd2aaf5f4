use std::collections::HashMap;

use reqwest::{Client, StatusCode, header::ACCEPT};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AppConfig, IndexerConfig};
use crate::convert::{ConversionOutcome, MagnetConverter};
use crate::feed;
use crate::normalize::{self, NormalizedItem};
use crate::results::TorrentResult;

/// Torznab category for the `cat` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Movies,
    Tv,
}

impl Category {
    pub fn code(self) -> u32 {
        match self {
            Category::Movies => 2000,
            Category::Tv => 5000,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to build indexer request URL")]
    Url(#[from] url::ParseError),
    #[error("indexer did not respond before the request timeout")]
    Timeout,
    #[error("failed to reach the indexer")]
    Http(#[from] reqwest::Error),
    #[error("indexer returned {0}")]
    UpstreamStatus(StatusCode),
}

impl SearchError {
    /// The HTTP status an API layer should answer with: 504 when the
    /// indexer timed out, 502 for everything else upstream.
    pub fn gateway_status(&self) -> StatusCode {
        match self {
            SearchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Client for one Torznab indexer. Runs the whole pipeline: query the feed,
/// normalize its items, resolve `.torrent`-only items into magnets, and
/// return finished results in feed order.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    http: Client,
    config: IndexerConfig,
    converter: MagnetConverter,
}

impl IndexerClient {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.indexer.request_timeout)
            .user_agent(format!("magnetarr/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let converter = MagnetConverter::new(config.conversion)?;

        Ok(Self {
            http,
            config: config.indexer,
            converter,
        })
    }

    /// Searches the indexer and returns resolved results.
    ///
    /// A blank query short-circuits to an empty list without touching the
    /// network. Transport and upstream-status failures are hard errors; a
    /// feed body that does not parse, and individual items that cannot be
    /// normalized or resolved, degrade to fewer results instead.
    pub async fn search(
        &self,
        query: &str,
        category: Option<Category>,
    ) -> Result<Vec<TorrentResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.fetch_feed(query, category).await?;

        let raw_items = match feed::parse(&body) {
            Ok(items) => items,
            Err(err) => {
                debug!(error = %err, "feed body did not parse; returning zero results");
                return Ok(Vec::new());
            }
        };
        debug!(query, items = raw_items.len(), "indexer feed parsed");

        // Normalize in feed order; the slot list preserves that order
        // through magnet resolution.
        let mut slots = Vec::with_capacity(raw_items.len());
        for raw in &raw_items {
            match normalize::normalize_item(raw) {
                Ok(slot) => slots.push(slot),
                Err(reason) => {
                    debug!(
                        %reason,
                        title = raw.title.as_deref().unwrap_or_default(),
                        "dropping feed item"
                    );
                }
            }
        }

        let pending_urls: Vec<String> = slots
            .iter()
            .filter_map(|slot| match slot {
                NormalizedItem::Pending(pending) => Some(pending.torrent_file_url.clone()),
                NormalizedItem::Ready(_) => None,
            })
            .collect();

        let outcomes = if pending_urls.is_empty() {
            HashMap::new()
        } else {
            self.converter.convert_all(&pending_urls).await
        };

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                NormalizedItem::Ready(result) => results.push(*result),
                NormalizedItem::Pending(pending) => {
                    match outcomes.get(&pending.torrent_file_url) {
                        Some(ConversionOutcome::Resolved(magnet_uri)) => {
                            results.push(pending.promote(magnet_uri.clone()));
                        }
                        outcome => {
                            debug!(
                                url = %pending.torrent_file_url,
                                ?outcome,
                                "dropping item whose torrent link did not resolve"
                            );
                        }
                    }
                }
            }
        }

        info!(
            query,
            feed_items = raw_items.len(),
            results = results.len(),
            "search completed"
        );
        Ok(results)
    }

    async fn fetch_feed(
        &self,
        query: &str,
        category: Option<Category>,
    ) -> Result<String, SearchError> {
        let mut url = self.config.base_url.join(&self.config.search_path)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("t", "search");
            pairs.append_pair("q", query);
            pairs.append_pair("limit", &self.config.result_limit.to_string());
            pairs.append_pair("apikey", &self.config.api_key);
            if let Some(category) = category {
                pairs.append_pair("cat", &category.code().to_string());
            }
        }

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/rss+xml, application/xml;q=0.9")
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Http(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::UpstreamStatus(status));
        }

        response.text().await.map_err(|err| {
            if err.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Http(err)
            }
        })
    }
}
