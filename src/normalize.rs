use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

use crate::feed::RawItem;
use crate::quality::Quality;
use crate::results::TorrentResult;

/// A feed item that only exposed a `.torrent` enclosure. It either gets
/// promoted into a [`TorrentResult`] once a magnet URI has been resolved, or
/// is dropped; callers never see this form.
#[derive(Debug, Clone)]
pub struct PendingResult {
    pub id: String,
    pub title: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub leechers: u32,
    pub indexer_name: String,
    pub publish_date: Option<OffsetDateTime>,
    pub quality: Quality,
    pub torrent_file_url: String,
}

impl PendingResult {
    pub fn promote(self, magnet_uri: String) -> TorrentResult {
        TorrentResult {
            id: self.id,
            title: self.title,
            size_bytes: self.size_bytes,
            seeders: self.seeders,
            leechers: self.leechers,
            magnet_uri,
            indexer_name: self.indexer_name,
            publish_date: self.publish_date,
            quality: self.quality,
        }
    }
}

#[derive(Debug)]
pub enum NormalizedItem {
    /// Carries a magnet URI already; nothing left to resolve.
    Ready(Box<TorrentResult>),
    /// Needs its `.torrent` URL converted before it can be returned.
    Pending(Box<PendingResult>),
}

/// Why an individual feed item was discarded. Drops never abort the search;
/// the pipeline logs them at debug level and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("item has no title")]
    MissingTitle,
    #[error("item has neither a magnet nor a torrent-file link")]
    NoUsableLink,
}

const UNKNOWN_INDEXER: &str = "Unknown";

/// Converts one raw feed item into either a finished result or a pending
/// record awaiting magnet resolution.
pub fn normalize_item(raw: &RawItem) -> Result<NormalizedItem, DropReason> {
    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .ok_or(DropReason::MissingTitle)?;

    let seeders: u32 = raw
        .attr("seeders")
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0);
    let peers: u32 = raw
        .attr("peers")
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0);
    let leechers = peers.saturating_sub(seeders);

    let size_bytes = raw
        .attr("size")
        .and_then(parse_size)
        .or_else(|| raw.size.as_deref().and_then(parse_size))
        .or(raw.enclosure_length)
        .unwrap_or(0);

    let indexer_name = raw
        .indexer_name
        .clone()
        .unwrap_or_else(|| UNKNOWN_INDEXER.to_string());
    let publish_date = raw.pub_date.as_deref().and_then(parse_timestamp);
    let quality = Quality::infer(title);

    if let Some(magnet_uri) = direct_magnet(raw, title) {
        let id = raw.guid.clone().unwrap_or_else(|| magnet_uri.clone());
        return Ok(NormalizedItem::Ready(Box::new(TorrentResult {
            id,
            title: title.to_string(),
            size_bytes,
            seeders,
            leechers,
            magnet_uri,
            indexer_name,
            publish_date,
            quality,
        })));
    }

    let Some(torrent_file_url) = raw.enclosure_url.clone() else {
        return Err(DropReason::NoUsableLink);
    };

    let id = raw.guid.clone().unwrap_or_else(|| torrent_file_url.clone());
    Ok(NormalizedItem::Pending(Box::new(PendingResult {
        id,
        title: title.to_string(),
        size_bytes,
        seeders,
        leechers,
        indexer_name,
        publish_date,
        quality,
        torrent_file_url,
    })))
}

/// A magnet URI the item already carries or that can be built locally,
/// tried in order: explicit attribute, info hash + title, magnet enclosure.
fn direct_magnet(raw: &RawItem, title: &str) -> Option<String> {
    if let Some(magnet) = raw.attr("magneturl") {
        return Some(magnet.to_string());
    }

    if let Some(info_hash) = raw.attr("infohash") {
        return Some(magnet_from_info_hash(info_hash, title));
    }

    raw.enclosure_url
        .as_deref()
        .filter(|url| url.starts_with("magnet:"))
        .map(str::to_string)
}

pub fn magnet_from_info_hash(info_hash: &str, title: &str) -> String {
    format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        info_hash,
        urlencoding::encode(title)
    )
}

/// Parses a vendor size value: either a bare byte count or a human string
/// like `"1.5 GB"`. Units use binary multipliers, `KiB`-style spellings
/// included.
pub fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.bytes().all(|byte| byte.is_ascii_digit()) {
        return text.parse().ok();
    }

    let unit_start = text.find(|ch: char| ch.is_ascii_alphabetic())?;
    let value: f64 = text[..unit_start].trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let multiplier: u64 = match text[unit_start..].trim().to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" | "KIB" => 1 << 10,
        "MB" | "MIB" => 1 << 20,
        "GB" | "GIB" => 1 << 30,
        "TB" | "TIB" => 1 << 40,
        _ => return None,
    };

    Some((value * multiplier as f64) as u64)
}

/// Feeds emit RFC 2822 `pubDate` values; some indexers send RFC 3339
/// instead, so both are tried.
fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(value, &Rfc3339))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn raw(title: Option<&str>) -> RawItem {
        RawItem {
            title: title.map(str::to_string),
            ..RawItem::default()
        }
    }

    fn with_attr(mut item: RawItem, name: &str, value: &str) -> RawItem {
        item.attrs.insert(name.to_string(), value.to_string());
        item
    }

    #[test]
    fn missing_title_is_dropped() {
        assert_eq!(
            normalize_item(&raw(None)).unwrap_err(),
            DropReason::MissingTitle
        );
        assert_eq!(
            normalize_item(&raw(Some("   "))).unwrap_err(),
            DropReason::MissingTitle
        );
    }

    #[test]
    fn no_link_at_all_is_dropped() {
        assert_eq!(
            normalize_item(&raw(Some("Release"))).unwrap_err(),
            DropReason::NoUsableLink
        );
    }

    #[test]
    fn explicit_magnet_attribute_wins() {
        let item = with_attr(
            with_attr(raw(Some("Release")), "magneturl", "magnet:?xt=urn:btih:aa"),
            "infohash",
            "bb",
        );
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.magnet_uri, "magnet:?xt=urn:btih:aa");
    }

    #[test]
    fn info_hash_builds_magnet_with_encoded_title() {
        let item = with_attr(raw(Some("My Movie 1080p")), "infohash", "deadbeef");
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(
            result.magnet_uri,
            "magnet:?xt=urn:btih:deadbeef&dn=My%20Movie%201080p"
        );
        assert_eq!(result.quality, Quality::P1080);
    }

    #[test]
    fn magnet_enclosure_is_used_directly() {
        let mut item = raw(Some("Release"));
        item.enclosure_url = Some("magnet:?xt=urn:btih:cc".to_string());
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.magnet_uri, "magnet:?xt=urn:btih:cc");
    }

    #[test]
    fn torrent_enclosure_becomes_pending() {
        let mut item = raw(Some("Release.720p"));
        item.enclosure_url = Some("https://indexer.example/dl/1.torrent".to_string());
        let NormalizedItem::Pending(pending) = normalize_item(&item).unwrap() else {
            panic!("expected pending result");
        };
        assert_eq!(
            pending.torrent_file_url,
            "https://indexer.example/dl/1.torrent"
        );
        assert_eq!(pending.quality, Quality::P720);
        // No guid, so the link doubles as the identifier.
        assert_eq!(pending.id, "https://indexer.example/dl/1.torrent");
    }

    #[test]
    fn leechers_never_go_negative() {
        let item = with_attr(
            with_attr(
                with_attr(raw(Some("Release")), "infohash", "aa"),
                "seeders",
                "5",
            ),
            "peers",
            "3",
        );
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.seeders, 5);
        assert_eq!(result.leechers, 0);
    }

    #[test]
    fn peers_minus_seeders_gives_leechers() {
        let item = with_attr(
            with_attr(
                with_attr(raw(Some("Release")), "infohash", "aa"),
                "seeders",
                "18",
            ),
            "peers",
            "26",
        );
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.leechers, 8);
    }

    #[test]
    fn invalid_counts_default_to_zero() {
        let item = with_attr(
            with_attr(raw(Some("Release")), "infohash", "aa"),
            "seeders",
            "lots",
        );
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.seeders, 0);
    }

    #[test]
    fn size_units_use_binary_multipliers() {
        assert_eq!(parse_size("1.5 GB"), Some(1_610_612_736));
        assert_eq!(parse_size("1.5GB"), Some(1_610_612_736));
        assert_eq!(parse_size("1.2 GiB"), Some(1_288_490_188));
        assert_eq!(parse_size("500 MiB"), Some(524_288_000));
        assert_eq!(parse_size("2 TB"), Some(2_199_023_255_552));
        assert_eq!(parse_size("734003200"), Some(734_003_200));
    }

    #[test]
    fn unparsable_sizes_are_none() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("big"), None);
        assert_eq!(parse_size("1.5 parsecs"), None);
        assert_eq!(parse_size("-3 GB"), None);
    }

    #[test]
    fn size_falls_back_to_enclosure_length() {
        let mut item = with_attr(raw(Some("Release")), "infohash", "aa");
        item.enclosure_length = Some(42);
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.size_bytes, 42);
    }

    #[test]
    fn missing_indexer_name_becomes_unknown() {
        let item = with_attr(raw(Some("Release")), "infohash", "aa");
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.indexer_name, "Unknown");
    }

    #[test]
    fn rfc2822_pub_dates_parse() {
        let mut item = with_attr(raw(Some("Release")), "infohash", "aa");
        item.pub_date = Some("Tue, 30 Dec 2025 06:22:52 +0000".to_string());
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert!(result.publish_date.is_some());
    }

    #[test]
    fn raw_attr_lookup_maps_names() {
        let mut attrs = HashMap::new();
        attrs.insert("seeders".to_string(), "7".to_string());
        let item = RawItem {
            attrs,
            ..RawItem::default()
        };
        assert_eq!(item.attr("seeders"), Some("7"));
        assert_eq!(item.attr("peers"), None);
    }

    #[test]
    fn negative_peers_default_to_zero() {
        let item = with_attr(
            with_attr(raw(Some("Release")), "infohash", "aa"),
            "peers",
            "-4",
        );
        let NormalizedItem::Ready(result) = normalize_item(&item).unwrap() else {
            panic!("expected ready result");
        };
        assert_eq!(result.leechers, 0);
    }
}
