use std::ops::Range;

use sha1::{Digest, Sha1};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorrentParseError {
    #[error("torrent file is not a bencoded dictionary")]
    NotADictionary,
    #[error("torrent file is malformed or truncated at byte {0}")]
    Malformed(usize),
    #[error("torrent file has no info dictionary")]
    MissingInfo,
}

/// The slice of a `.torrent` file this pipeline cares about: the identity
/// hash plus everything needed to build a useful magnet URI.
#[derive(Debug, Clone)]
pub struct TorrentMetadata {
    pub info_hash: [u8; 20],
    pub name: Option<String>,
    pub trackers: Vec<String>,
}

impl TorrentMetadata {
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }
}

/// Parses a `.torrent` file body far enough to compute its info hash and
/// collect its declared trackers.
///
/// The info hash is the SHA-1 of the info dictionary's exact bencoded bytes,
/// so the walker tracks byte spans instead of building a value tree: the
/// `info` value is located structurally and hashed in place.
pub fn parse_torrent(data: &[u8]) -> Result<TorrentMetadata, TorrentParseError> {
    let mut walker = Walker::new(data);
    if walker.peek().map_err(|_| TorrentParseError::NotADictionary)? != b'd' {
        return Err(TorrentParseError::NotADictionary);
    }
    walker.bump();

    let mut info_span: Option<Range<usize>> = None;
    let mut trackers: Vec<String> = Vec::new();

    while walker.peek()? != b'e' {
        let key = walker.parse_bytes()?;
        match key {
            b"info" => {
                if walker.peek()? != b'd' {
                    return Err(TorrentParseError::Malformed(walker.pos));
                }
                info_span = Some(walker.value_span()?);
            }
            b"announce" if walker.peek()?.is_ascii_digit() => {
                let url = walker.parse_bytes()?;
                push_tracker(&mut trackers, url);
            }
            b"announce-list" if walker.peek()? == b'l' => {
                walker.bump();
                // Tiers: a list of lists of byte strings.
                while walker.peek()? != b'e' {
                    if walker.peek()? != b'l' {
                        walker.skip_value()?;
                        continue;
                    }
                    walker.bump();
                    while walker.peek()? != b'e' {
                        if walker.peek()?.is_ascii_digit() {
                            let url = walker.parse_bytes()?;
                            push_tracker(&mut trackers, url);
                        } else {
                            walker.skip_value()?;
                        }
                    }
                    walker.bump();
                }
                walker.bump();
            }
            _ => walker.skip_value()?,
        }
    }

    let info_span = info_span.ok_or(TorrentParseError::MissingInfo)?;
    let info_bytes = &data[info_span];

    let mut hasher = Sha1::new();
    hasher.update(info_bytes);
    let digest = hasher.finalize();
    let mut info_hash = [0u8; 20];
    info_hash.copy_from_slice(&digest);

    Ok(TorrentMetadata {
        info_hash,
        name: extract_name(info_bytes),
        trackers,
    })
}

/// Builds a magnet URI carrying the info hash, the display name when the
/// torrent declares one, and every tracker as a `tr` parameter.
pub fn build_magnet(metadata: &TorrentMetadata) -> String {
    let mut magnet = format!("magnet:?xt=urn:btih:{}", metadata.info_hash_hex());
    if let Some(name) = metadata.name.as_deref() {
        magnet.push_str("&dn=");
        magnet.push_str(&urlencoding::encode(name));
    }
    for tracker in &metadata.trackers {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

fn push_tracker(trackers: &mut Vec<String>, url: &[u8]) {
    let Ok(url) = std::str::from_utf8(url) else {
        return;
    };
    // announce usually repeats as the first announce-list tier.
    if !trackers.iter().any(|existing| existing == url) {
        trackers.push(url.to_string());
    }
}

/// Pulls the display name out of the info dictionary, preferring the
/// `name.utf-8` spelling some encoders emit.
fn extract_name(info_bytes: &[u8]) -> Option<String> {
    let mut walker = Walker::new(info_bytes);
    if walker.peek().ok()? != b'd' {
        return None;
    }
    walker.bump();

    let mut name: Option<String> = None;
    let mut name_utf8: Option<String> = None;

    while walker.peek().ok()? != b'e' {
        let key = walker.parse_bytes().ok()?;
        match key {
            b"name" | b"name.utf-8" if walker.peek().ok()?.is_ascii_digit() => {
                let value = walker.parse_bytes().ok()?;
                let Ok(value) = std::str::from_utf8(value) else {
                    continue;
                };
                if key == b"name.utf-8" {
                    name_utf8 = Some(value.to_string());
                } else {
                    name = Some(value.to_string());
                }
            }
            _ => walker.skip_value().ok()?,
        }
    }

    name_utf8.or(name)
}

/// Minimal bencode cursor. Values are skipped or sliced, never materialized.
struct Walker<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Walker<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Result<u8, TorrentParseError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(TorrentParseError::Malformed(self.pos))
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn parse_bytes(&mut self) -> Result<&'a [u8], TorrentParseError> {
        let len = self.parse_length()?;
        if self.peek()? != b':' {
            return Err(TorrentParseError::Malformed(self.pos));
        }
        self.bump();
        let end = self
            .pos
            .checked_add(len)
            .ok_or(TorrentParseError::Malformed(self.pos))?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(TorrentParseError::Malformed(self.pos))?;
        self.pos = end;
        Ok(bytes)
    }

    fn parse_length(&mut self) -> Result<usize, TorrentParseError> {
        let start = self.pos;
        let mut length: usize = 0;
        while let Ok(byte) = self.peek() {
            if !byte.is_ascii_digit() {
                break;
            }
            length = length
                .checked_mul(10)
                .and_then(|n| n.checked_add(usize::from(byte - b'0')))
                .ok_or(TorrentParseError::Malformed(self.pos))?;
            self.bump();
        }
        if self.pos == start {
            return Err(TorrentParseError::Malformed(self.pos));
        }
        Ok(length)
    }

    /// Skips one value and returns the byte range it occupied.
    fn value_span(&mut self) -> Result<Range<usize>, TorrentParseError> {
        let start = self.pos;
        self.skip_value()?;
        Ok(start..self.pos)
    }

    fn skip_value(&mut self) -> Result<(), TorrentParseError> {
        match self.peek()? {
            b'i' => {
                self.bump();
                while self.peek()? != b'e' {
                    self.bump();
                }
                self.bump();
            }
            b'l' => {
                self.bump();
                while self.peek()? != b'e' {
                    self.skip_value()?;
                }
                self.bump();
            }
            b'd' => {
                self.bump();
                while self.peek()? != b'e' {
                    self.parse_bytes()?;
                    self.skip_value()?;
                }
                self.bump();
            }
            byte if byte.is_ascii_digit() => {
                self.parse_bytes()?;
            }
            _ => return Err(TorrentParseError::Malformed(self.pos)),
        }
        Ok(())
    }
}
