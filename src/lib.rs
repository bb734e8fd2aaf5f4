//! Torznab search aggregation with magnet resolution.
//!
//! [`search::IndexerClient`] queries a Torznab indexer, normalizes the feed
//! into [`results::TorrentResult`] records, and converts items that only
//! ship a `.torrent` link into magnet URIs, so every returned result carries
//! a magnet. [`results`] adds sorting and quality filtering on top.

pub mod config;
pub mod convert;
pub mod feed;
pub mod magnet;
pub mod normalize;
pub mod quality;
pub mod results;
pub mod safety;
pub mod search;

pub use config::{AppConfig, IndexerConfig};
pub use convert::{ConversionConfig, ConversionOutcome, MagnetConverter};
pub use quality::Quality;
pub use results::{SortDirection, SortField, TorrentResult, filter_by_quality, sort_results};
pub use search::{Category, IndexerClient, SearchError};
