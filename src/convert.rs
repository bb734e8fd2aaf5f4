use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::magnet;
use crate::safety::{self, UrlPolicyError};

/// Terminal fate of one torrent-file URL submitted for conversion. Every
/// submitted URL receives exactly one of these, whatever else goes wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    /// Magnet URI built from the fetched torrent file.
    Resolved(String),
    /// Refused by the URL safety gate before any fetch.
    Rejected(UrlPolicyError),
    /// Fetch or parse failed.
    Failed(String),
    /// Per-request timeout, or the batch deadline expired first.
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Timeout for each individual torrent-file fetch.
    pub request_timeout: Duration,
    /// Wall-clock budget for one whole batch of conversions.
    pub batch_deadline: Duration,
    /// Upper bound on simultaneous outbound fetches.
    pub max_concurrency: usize,
    /// Permits torrent-file fetches from loopback and private address
    /// ranges, for installs whose indexer lives on the local network.
    /// Malformed URLs and non-http(s) schemes stay rejected either way.
    pub allow_private_networks: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            batch_deadline: Duration::from_secs(10),
            max_concurrency: 5,
            allow_private_networks: false,
        }
    }
}

/// Fetches `.torrent` files and turns them into magnet URIs.
///
/// Feed content decides which URLs get fetched, so every URL passes the
/// safety gate in [`safety`] before a request goes out.
#[derive(Debug, Clone)]
pub struct MagnetConverter {
    http: Client,
    config: ConversionConfig,
}

impl MagnetConverter {
    pub fn new(config: ConversionConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(format!("magnetarr/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Resolves one torrent-file URL into a magnet URI.
    ///
    /// Expects a URL the safety gate has already cleared;
    /// [`MagnetConverter::convert_all`] enforces that. Never returns an
    /// error: every failure mode collapses into a [`ConversionOutcome`].
    pub async fn resolve(&self, url: &str) -> ConversionOutcome {
        let response = match self
            .http
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return ConversionOutcome::TimedOut,
            Err(err) => return ConversionOutcome::Failed(err.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return ConversionOutcome::Failed(format!("torrent host returned {status}"));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) if err.is_timeout() => return ConversionOutcome::TimedOut,
            Err(err) => return ConversionOutcome::Failed(err.to_string()),
        };

        match magnet::parse_torrent(&body) {
            Ok(metadata) => {
                debug!(
                    url,
                    info_hash = %metadata.info_hash_hex(),
                    trackers = metadata.trackers.len(),
                    "torrent file resolved to magnet"
                );
                ConversionOutcome::Resolved(magnet::build_magnet(&metadata))
            }
            Err(err) => ConversionOutcome::Failed(err.to_string()),
        }
    }

    /// Resolves a batch of torrent-file URLs under the configured
    /// concurrency cap and batch deadline. The returned map holds exactly
    /// one outcome per distinct input URL.
    pub async fn convert_all(&self, urls: &[String]) -> HashMap<String, ConversionOutcome> {
        let converter = self.clone();
        run_batch(
            urls,
            self.config.max_concurrency,
            self.config.batch_deadline,
            move |url| {
                let converter = converter.clone();
                async move {
                    match safety::validate_torrent_url(&url) {
                        Ok(_) => converter.resolve(&url).await,
                        Err(UrlPolicyError::PrivateAddress(host))
                            if converter.config.allow_private_networks =>
                        {
                            debug!(url, host, "private address permitted by override");
                            converter.resolve(&url).await
                        }
                        Err(reason) => {
                            debug!(url, %reason, "torrent url rejected by safety gate");
                            ConversionOutcome::Rejected(reason)
                        }
                    }
                }
            },
        )
        .await
    }
}

/// Chunked fan-out with a cooperative deadline.
///
/// URLs are processed in chunks of `max_concurrency`: each chunk runs
/// concurrently and is awaited in full before the next is dispatched, so at
/// most one chunk's worth of work is ever in flight. The deadline is checked
/// before each dispatch; once it has passed, remaining chunks are never
/// started. A final sweep records `TimedOut` for every URL left without an
/// outcome, which is what guarantees one outcome per input.
pub(crate) async fn run_batch<F, Fut>(
    urls: &[String],
    max_concurrency: usize,
    batch_deadline: Duration,
    resolve: F,
) -> HashMap<String, ConversionOutcome>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = ConversionOutcome> + Send + 'static,
{
    let deadline = Instant::now() + batch_deadline;
    let mut outcomes: HashMap<String, ConversionOutcome> = HashMap::with_capacity(urls.len());

    for chunk in urls.chunks(max_concurrency.max(1)) {
        if Instant::now() >= deadline {
            warn!(
                pending = urls.len() - outcomes.len(),
                "batch deadline reached; skipping remaining conversions"
            );
            break;
        }

        let mut tasks = JoinSet::new();
        for url in chunk {
            let future = resolve(url.clone());
            let url = url.clone();
            tasks.spawn(async move { (url, future.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((url, outcome)) = joined {
                outcomes.insert(url, outcome);
            }
        }
    }

    for url in urls {
        outcomes
            .entry(url.clone())
            .or_insert(ConversionOutcome::TimedOut);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::sleep;

    use super::*;

    fn urls(count: usize) -> Vec<String> {
        (0..count)
            .map(|index| format!("https://indexer.example/dl/{index}.torrent"))
            .collect()
    }

    #[tokio::test]
    async fn every_url_gets_exactly_one_outcome() {
        let inputs = urls(7);
        let outcomes = run_batch(&inputs, 3, Duration::from_secs(5), |url| async move {
            if url.ends_with("3.torrent") {
                ConversionOutcome::Failed("boom".to_string())
            } else {
                ConversionOutcome::Resolved(format!("magnet:?xt=urn:btih:{url}"))
            }
        })
        .await;

        assert_eq!(outcomes.len(), inputs.len());
        for url in &inputs {
            assert!(outcomes.contains_key(url));
        }
        assert_eq!(
            outcomes["https://indexer.example/dl/3.torrent"],
            ConversionOutcome::Failed("boom".to_string())
        );
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let inputs = urls(12);
        let outcomes = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            run_batch(&inputs, 5, Duration::from_secs(30), move |_url| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(30)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    ConversionOutcome::Resolved("magnet:?xt=urn:btih:aa".to_string())
                }
            })
            .await
        };

        assert_eq!(outcomes.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn deadline_expiry_marks_undispatched_urls_timed_out() {
        let inputs = urls(11);
        let outcomes = run_batch(&inputs, 5, Duration::from_millis(200), |_url| async move {
            sleep(Duration::from_millis(150)).await;
            ConversionOutcome::Resolved("magnet:?xt=urn:btih:aa".to_string())
        })
        .await;

        assert_eq!(outcomes.len(), 11);
        // The first chunk always dispatches (the deadline check happens
        // before any work), and the trailing single-url chunk can never
        // start before the deadline has passed.
        let resolved = outcomes
            .values()
            .filter(|outcome| matches!(outcome, ConversionOutcome::Resolved(_)))
            .count();
        assert!(resolved >= 5);
        assert_eq!(
            outcomes["https://indexer.example/dl/10.torrent"],
            ConversionOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn empty_batch_is_an_empty_map() {
        let outcomes = run_batch(&[], 5, Duration::from_secs(1), |_url| async move {
            ConversionOutcome::TimedOut
        })
        .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn loopback_urls_are_rejected_without_a_fetch() {
        let converter = MagnetConverter::new(ConversionConfig::default()).unwrap();
        let inputs = vec!["http://127.0.0.1:9999/x.torrent".to_string()];
        let outcomes = converter.convert_all(&inputs).await;

        // A rejection (not a connection failure) proves the request never
        // went out: nothing listens on that port.
        assert!(matches!(
            outcomes["http://127.0.0.1:9999/x.torrent"],
            ConversionOutcome::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn private_network_override_reaches_the_fetch_step() {
        let converter = MagnetConverter::new(ConversionConfig {
            allow_private_networks: true,
            ..ConversionConfig::default()
        })
        .unwrap();
        let inputs = vec![
            "http://127.0.0.1:9/x.torrent".to_string(),
            "ftp://indexer.example/x.torrent".to_string(),
        ];
        let outcomes = converter.convert_all(&inputs).await;

        // With the override the gate lets the fetch go out, which fails
        // against the closed port instead of being rejected up front.
        // Scheme policy is unaffected by the override.
        assert!(matches!(
            outcomes["http://127.0.0.1:9/x.torrent"],
            ConversionOutcome::Failed(_)
        ));
        assert!(matches!(
            outcomes["ftp://indexer.example/x.torrent"],
            ConversionOutcome::Rejected(UrlPolicyError::DisallowedScheme(_))
        ));
    }

    #[tokio::test]
    async fn disallowed_scheme_is_rejected() {
        let converter = MagnetConverter::new(ConversionConfig::default()).unwrap();
        let inputs = vec!["ftp://indexer.example/x.torrent".to_string()];
        let outcomes = converter.convert_all(&inputs).await;
        assert!(matches!(
            outcomes["ftp://indexer.example/x.torrent"],
            ConversionOutcome::Rejected(UrlPolicyError::DisallowedScheme(_))
        ));
    }
}
