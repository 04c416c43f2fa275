//! Input parsing, classification, and playlist expansion.
//!
//! Raw text arrives as free-form lines: direct URLs, playlist URLs, or
//! search queries. The resolver turns them into ordered
//! [`TrackDescriptor`]s, expanding playlists through the extraction
//! collaborator in metadata-only mode. Expansion is best-effort: a failed
//! expansion degrades to a single descriptor wrapping the raw input and
//! never aborts the batch.

use crate::extractor::{MediaExtractor, PlaylistEntry};
use crate::model::TrackDescriptor;

/// Placeholder title for playlist entries the source reported without one.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Substrings that mark a URL as a playlist/collection.
const PLAYLIST_MARKERS: &[&str] = &["list=", "playlist", "/sets/"];

/// Split raw text into trimmed, non-empty, non-comment lines.
///
/// Input order is preserved; duplicates are kept.
pub fn parse_input(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Whether the input is URL-shaped (has a scheme prefix).
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether the input is a playlist/collection URL.
pub fn is_playlist_url(input: &str) -> bool {
    if !is_url(input) {
        return false;
    }
    let lower = input.to_lowercase();
    PLAYLIST_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Describe the parsed input for display.
pub fn classify(items: &[String]) -> String {
    match items {
        [] => "Empty".to_string(),
        [single] => {
            if is_playlist_url(single) {
                "Playlist URL".to_string()
            } else if is_url(single) {
                "Single URL".to_string()
            } else {
                "Search query".to_string()
            }
        }
        many => format!("Batch: {} items", many.len()),
    }
}

/// Result of expanding one raw input line.
///
/// `warning` carries a human-readable note when expansion degraded to a
/// fallback; the caller decides where to log it.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub descriptors: Vec<TrackDescriptor>,
    pub warning: Option<String>,
}

impl Expansion {
    fn clean(descriptors: Vec<TrackDescriptor>) -> Self {
        Self {
            descriptors,
            warning: None,
        }
    }
}

/// Expand one raw input line into track descriptors.
///
/// Playlist URLs go through the collaborator's metadata-only mode; direct
/// URLs and search queries map to exactly one descriptor. Search queries
/// get an empty `url` - the download step prefixes them later.
pub async fn expand(extractor: &dyn MediaExtractor, raw: &str) -> Expansion {
    if !is_playlist_url(raw) {
        let descriptor = if is_url(raw) {
            TrackDescriptor {
                url: raw.to_string(),
                title: raw.to_string(),
                duration: 0,
            }
        } else {
            TrackDescriptor {
                url: String::new(),
                title: raw.to_string(),
                duration: 0,
            }
        };
        return Expansion::clean(vec![descriptor]);
    }

    match extractor.expand_playlist(raw).await {
        Ok(entries) if !entries.is_empty() => Expansion::clean(
            entries.into_iter().map(descriptor_from_entry).collect(),
        ),
        Ok(_) => Expansion {
            descriptors: vec![fallback_descriptor(raw)],
            warning: Some(format!("Playlist returned no entries: {}", head(raw, 50))),
        },
        Err(e) => {
            tracing::warn!("Playlist expansion failed for {}: {}", head(raw, 50), e);
            Expansion {
                descriptors: vec![fallback_descriptor(raw)],
                warning: Some(format!("Extraction error: {}", head(&e.to_string(), 60))),
            }
        }
    }
}

/// Map one playlist entry, filling fallbacks for missing fields.
fn descriptor_from_entry(entry: PlaylistEntry) -> TrackDescriptor {
    let url = if entry.url.is_empty() {
        format!(
            "https://youtube.com/watch?v={}",
            urlencoding::encode(&entry.id)
        )
    } else {
        entry.url
    };
    let title = if entry.title.is_empty() {
        UNKNOWN_TITLE.to_string()
    } else {
        entry.title
    };
    TrackDescriptor {
        url,
        title,
        duration: entry.duration,
    }
}

/// Single-descriptor fallback when expansion fails outright.
fn fallback_descriptor(raw: &str) -> TrackDescriptor {
    TrackDescriptor {
        url: raw.to_string(),
        title: head(raw, 50),
        duration: 0,
    }
}

fn head(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::mocks::MockExtractor;
    use crate::extractor::ExtractError;
    use proptest::prelude::*;

    #[test]
    fn test_parse_drops_blanks_and_comments() {
        let text = "http://x\n# c\nArtist Song\n\nTrack2";
        let items = parse_input(text);
        assert_eq!(items, vec!["http://x", "Artist Song", "Track2"]);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let items = parse_input("  padded query  \n\t\n");
        assert_eq!(items, vec!["padded query"]);
    }

    #[test]
    fn test_parse_keeps_duplicates_in_order() {
        let items = parse_input("a\nb\na");
        assert_eq!(items, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&[]), "Empty");
        assert_eq!(
            classify(&["https://y/watch?v=1".to_string()]),
            "Single URL"
        );
        assert_eq!(
            classify(&["https://y/playlist?list=PL1".to_string()]),
            "Playlist URL"
        );
        assert_eq!(
            classify(&["https://soundcloud.com/artist/sets/mix".to_string()]),
            "Playlist URL"
        );
        assert_eq!(classify(&["Artist - Song".to_string()]), "Search query");
        assert_eq!(
            classify(&["a".to_string(), "b".to_string(), "c".to_string()]),
            "Batch: 3 items"
        );
    }

    #[test]
    fn test_playlist_detection_is_case_insensitive() {
        assert!(is_playlist_url("https://y/PLAYLIST?id=1"));
        assert!(!is_playlist_url("playlist without scheme"));
    }

    #[tokio::test]
    async fn test_expand_search_query_keeps_url_empty() {
        let mock = MockExtractor::completing();
        let expansion = expand(&mock, "Bohemian Rhapsody Queen").await;
        assert_eq!(expansion.descriptors.len(), 1);
        assert!(expansion.descriptors[0].url.is_empty());
        assert_eq!(expansion.descriptors[0].title, "Bohemian Rhapsody Queen");
        assert!(expansion.warning.is_none());
    }

    #[tokio::test]
    async fn test_expand_direct_url_is_single_descriptor() {
        let mock = MockExtractor::completing();
        let expansion = expand(&mock, "https://y/watch?v=1").await;
        assert_eq!(expansion.descriptors.len(), 1);
        assert_eq!(expansion.descriptors[0].url, "https://y/watch?v=1");
    }

    #[tokio::test]
    async fn test_expand_playlist_fills_placeholders() {
        let entries = (0..5)
            .map(|i| PlaylistEntry {
                id: format!("id{i}"),
                title: String::new(),
                url: String::new(),
                duration: 0,
            })
            .collect();
        let mock = MockExtractor::with_playlist(entries);
        let expansion = expand(&mock, "https://y/playlist?list=PL1").await;
        assert_eq!(expansion.descriptors.len(), 5);
        for (i, d) in expansion.descriptors.iter().enumerate() {
            assert_eq!(d.title, UNKNOWN_TITLE);
            assert_eq!(d.duration, 0);
            assert_eq!(d.url, format!("https://youtube.com/watch?v=id{i}"));
        }
    }

    #[tokio::test]
    async fn test_expand_playlist_failure_degrades_to_fallback() {
        let mock = MockExtractor::failing_expansion(ExtractError::Failed("timeout".to_string()));
        let url = "https://y/playlist?list=PL1";
        let expansion = expand(&mock, url).await;
        assert_eq!(expansion.descriptors.len(), 1);
        assert_eq!(expansion.descriptors[0].url, url);
        assert!(expansion.warning.unwrap().contains("Extraction error"));
    }

    #[tokio::test]
    async fn test_expand_empty_playlist_degrades_to_fallback() {
        let mock = MockExtractor::with_playlist(vec![]);
        let expansion = expand(&mock, "https://y/playlist?list=PL1").await;
        assert_eq!(expansion.descriptors.len(), 1);
        assert!(expansion.warning.is_some());
    }

    proptest! {
        #[test]
        fn prop_parse_never_yields_blank_or_comment(text in ".*") {
            for item in parse_input(&text) {
                prop_assert!(!item.is_empty());
                prop_assert!(!item.starts_with('#'));
                prop_assert_eq!(item.trim(), item.as_str());
            }
        }

        #[test]
        fn prop_parse_preserves_relative_order(lines in proptest::collection::vec("[a-z]{1,8}", 0..10)) {
            let text = lines.join("\n");
            let parsed = parse_input(&text);
            // Every input line is non-blank and non-comment, so parse is identity.
            prop_assert_eq!(parsed, lines);
        }
    }
}
