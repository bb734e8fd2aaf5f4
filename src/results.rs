use serde::Serialize;
use time::OffsetDateTime;

use crate::quality::Quality;

/// A fully resolved search result. Every instance carries a usable magnet
/// URI; results that could not be resolved never reach callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentResult {
    /// Vendor GUID when the feed supplies one, otherwise the link itself.
    /// Unique within one search response, not across indexers.
    pub id: String,
    pub title: String,
    /// `0` when the feed reported no usable size.
    pub size_bytes: u64,
    pub seeders: u32,
    pub leechers: u32,
    /// Always starts with `magnet:?`.
    pub magnet_uri: String,
    /// `"Unknown"` when the feed names no indexer.
    pub indexer_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub publish_date: Option<OffsetDateTime>,
    pub quality: Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Seeders,
    Size,
    PublishDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Stable in-place sort over a result list. Results without a publish date
/// sort as the UNIX epoch.
pub fn sort_results(results: &mut [TorrentResult], field: SortField, direction: SortDirection) {
    results.sort_by(|a, b| {
        let ordering = match field {
            SortField::Seeders => a.seeders.cmp(&b.seeders),
            SortField::Size => a.size_bytes.cmp(&b.size_bytes),
            SortField::PublishDate => {
                let left = a.publish_date.unwrap_or(OffsetDateTime::UNIX_EPOCH);
                let right = b.publish_date.unwrap_or(OffsetDateTime::UNIX_EPOCH);
                left.cmp(&right)
            }
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Keeps only results whose quality is in `qualities`. An empty filter set
/// means "no filter selected" and returns the input unchanged.
pub fn filter_by_quality(results: Vec<TorrentResult>, qualities: &[Quality]) -> Vec<TorrentResult> {
    if qualities.is_empty() {
        return results;
    }

    results
        .into_iter()
        .filter(|result| qualities.contains(&result.quality))
        .collect()
}
