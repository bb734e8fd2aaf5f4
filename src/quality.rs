use std::fmt;

use serde::Serialize;

/// Coarse video quality derived from a release title. Feeds never report
/// this directly; it is inferred so callers can filter and group results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Quality {
    #[serde(rename = "4K")]
    FourK,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    Unknown,
}

impl Quality {
    /// Infers a quality label from a free-text torrent title.
    ///
    /// Matching is case-insensitive substring search, most specific token
    /// first, so a title mentioning both `2160p` and `1080p` resolves to
    /// [`Quality::FourK`]. Total function; unrecognized titles map to
    /// [`Quality::Unknown`].
    pub fn infer(title: &str) -> Self {
        let title = title.to_lowercase();

        if contains_any(&title, &["2160p", "4k", "uhd"]) {
            Quality::FourK
        } else if contains_any(&title, &["1080p", "1080i"]) {
            Quality::P1080
        } else if title.contains("720p") {
            Quality::P720
        } else if contains_any(&title, &["480p", "dvd", "sd"]) {
            Quality::P480
        } else {
            Quality::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::FourK => "4K",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_token_wins() {
        assert_eq!(Quality::infer("Show.2160p.1080p"), Quality::FourK);
        assert_eq!(Quality::infer("Show.1080p.720p"), Quality::P1080);
    }

    #[test]
    fn matches_are_case_insensitive() {
        assert_eq!(Quality::infer("Movie.2024.UHD.BluRay"), Quality::FourK);
        assert_eq!(Quality::infer("Movie.2024.1080P.WEB-DL"), Quality::P1080);
        assert_eq!(Quality::infer("movie 720P hdtv"), Quality::P720);
    }

    #[test]
    fn interlaced_counts_as_1080() {
        assert_eq!(Quality::infer("Broadcast.1080i.ts"), Quality::P1080);
    }

    #[test]
    fn dvd_and_sd_map_to_480() {
        assert_eq!(Quality::infer("Old.Movie.DVDRip"), Quality::P480);
        assert_eq!(Quality::infer("clip [SD]"), Quality::P480);
    }

    #[test]
    fn unrecognized_title_is_unknown() {
        assert_eq!(Quality::infer("Some Release x264"), Quality::Unknown);
        assert_eq!(Quality::infer(""), Quality::Unknown);
    }
}
