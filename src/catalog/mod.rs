//! Music catalog - genre organization and metadata bookkeeping.
//!
//! Every successful download is recorded as a [`SongEntry`] keyed by a
//! content-derived id (hash of normalized title + artist + duration), so
//! re-adding the same track is a no-op. Genre is inferred from collaborator
//! metadata through an alias table; the whole catalog persists as one JSON
//! document after every insertion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::extractor::TrackInfo;

/// Genre used when nothing in the metadata matches the alias table.
pub const DEFAULT_GENRE: &str = "Uncategorized";

/// Maximum tags kept per entry.
const MAX_TAGS: usize = 20;

/// Many-to-one mapping from free-text synonyms to canonical genre names.
///
/// Order matters for the substring fallback scan: earlier aliases win.
/// Every canonical name is its own alias (lower-cased), which is what makes
/// normalization idempotent.
const GENRE_ALIASES: &[(&str, &str)] = &[
    ("hip hop", "Hip-Hop"),
    ("hip-hop", "Hip-Hop"),
    ("hiphop", "Hip-Hop"),
    ("rap", "Hip-Hop"),
    ("r&b", "R&B"),
    ("rnb", "R&B"),
    ("rhythm and blues", "R&B"),
    ("electronic", "Electronic"),
    ("edm", "Electronic"),
    ("house", "Electronic"),
    ("techno", "Electronic"),
    ("dubstep", "Electronic"),
    ("trance", "Electronic"),
    ("drum and bass", "Electronic"),
    ("dnb", "Electronic"),
    ("pop", "Pop"),
    ("rock", "Rock"),
    ("alternative", "Rock"),
    ("indie", "Indie"),
    ("indie rock", "Indie"),
    ("metal", "Metal"),
    ("heavy metal", "Metal"),
    ("jazz", "Jazz"),
    ("blues", "Blues"),
    ("classical", "Classical"),
    ("country", "Country"),
    ("folk", "Folk"),
    ("reggae", "Reggae"),
    ("soul", "Soul"),
    ("funk", "Funk"),
    ("disco", "Disco"),
    ("latin", "Latin"),
    ("world", "World"),
    ("ambient", "Ambient"),
    ("chill", "Chill"),
    ("lofi", "Lo-Fi"),
    ("lo-fi", "Lo-Fi"),
    ("soundtrack", "Soundtrack"),
    ("ost", "Soundtrack"),
    ("k-pop", "K-Pop"),
    ("kpop", "K-Pop"),
    ("j-pop", "J-Pop"),
    ("jpop", "J-Pop"),
    ("anime", "Anime"),
    ("game", "Gaming"),
    ("gaming", "Gaming"),
    ("workout", "Workout"),
    ("party", "Party"),
    ("romantic", "Romantic"),
    ("sad", "Emotional"),
    ("emotional", "Emotional"),
];

/// Normalize a free-text genre to a canonical name.
///
/// Total and idempotent: alias exact match first, then substring containment
/// in either direction, then a title-cased copy of the input; empty input
/// maps to [`DEFAULT_GENRE`]. The substring fallback can false-positive on
/// short aliases embedded in unrelated words; that is a known limitation.
pub fn normalize_genre(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return DEFAULT_GENRE.to_string();
    }
    let lower = trimmed.to_lowercase();

    for (alias, canonical) in GENRE_ALIASES {
        if *alias == lower {
            return (*canonical).to_string();
        }
    }
    for (alias, canonical) in GENRE_ALIASES {
        if lower.contains(alias) || alias.contains(lower.as_str()) {
            return (*canonical).to_string();
        }
    }
    title_case(trimmed)
}

/// Capitalize the first letter of each whitespace-separated word.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Infer a genre from collaborator metadata.
///
/// Fallback chain: explicit genre field, categories, first 10 tags, then an
/// alias scan over title plus the first 500 characters of the description.
pub fn detect_genre(info: &TrackInfo) -> String {
    if !info.genre.trim().is_empty() {
        return normalize_genre(&info.genre);
    }
    for category in &info.categories {
        let normalized = normalize_genre(category);
        if normalized != DEFAULT_GENRE {
            return normalized;
        }
    }
    for tag in info.tags.iter().take(10) {
        let normalized = normalize_genre(tag);
        if normalized != DEFAULT_GENRE {
            return normalized;
        }
    }

    let description: String = info.description.chars().take(500).collect();
    let combined = format!("{} {}", info.title, description).to_lowercase();
    for (alias, canonical) in GENRE_ALIASES {
        if combined.contains(alias) {
            return (*canonical).to_string();
        }
    }
    DEFAULT_GENRE.to_string()
}

/// Compute the content-derived catalog key.
///
/// First 16 hex chars of SHA-256 over the lower-cased, trimmed
/// `title|artist|duration` concatenation.
pub fn unique_id(title: &str, artist: &str, duration: u64) -> String {
    let content = format!(
        "{}|{}|{}",
        title.to_lowercase().trim(),
        artist.to_lowercase().trim(),
        duration
    );
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.chars().take(16).collect()
}

/// One catalog record; identity is independent of any session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SongEntry {
    pub unique_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// Seconds
    pub duration: u64,
    pub year: u32,
    pub file_path: String,
    pub file_size: u64,
    pub bitrate: String,
    pub source_url: String,
    /// RFC 3339 timestamp
    pub download_date: String,
    pub tags: Vec<String>,
    /// Free-form source metadata (uploader, channel, counts)
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// On-disk document shape.
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct CatalogDoc {
    version: String,
    updated: String,
    total_songs: usize,
    songs: Vec<SongEntry>,
}

/// Catalog statistics summary.
#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub total_songs: usize,
    pub total_artists: usize,
    pub total_duration_secs: u64,
    pub total_duration_formatted: String,
    /// (genre, count) sorted by count descending
    pub genres: Vec<(String, usize)>,
}

/// The persistent catalog index.
///
/// The song map has its own lock, distinct from the session aggregator's,
/// because catalog writes happen on worker tasks.
pub struct MusicCatalog {
    path: PathBuf,
    songs: Mutex<HashMap<String, SongEntry>>,
}

impl MusicCatalog {
    /// Open the catalog at `path`, loading any existing document.
    ///
    /// Unreadable or malformed documents fall back to an empty catalog with
    /// a warning; persisted state is advisory, not safety-critical.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let songs = match Self::load_doc(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to load catalog {:?}: {}", path, e);
                HashMap::new()
            }
        };
        Self {
            path,
            songs: Mutex::new(songs),
        }
    }

    fn load_doc(path: &Path) -> Result<HashMap<String, SongEntry>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(path)?;
        let doc: CatalogDoc = serde_json::from_str(&contents)?;
        Ok(doc
            .songs
            .into_iter()
            .map(|song| (song.unique_id.clone(), song))
            .collect())
    }

    /// Persist the full catalog document.
    pub fn save(&self) -> Result<()> {
        let songs = {
            let guard = self.songs.lock();
            let mut songs: Vec<SongEntry> = guard.values().cloned().collect();
            songs.sort_by(|a, b| a.download_date.cmp(&b.download_date));
            songs
        };
        let doc = CatalogDoc {
            version: "1.0".to_string(),
            updated: chrono::Utc::now().to_rfc3339(),
            total_songs: songs.len(),
            songs,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&doc)?;
        // Write atomically (write to temp, then rename)
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents)
            .map_err(|e| Error::persist(&temp_path, e.to_string()))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::persist(&self.path, e.to_string()))?;
        Ok(())
    }

    /// Add a song, idempotently by content key.
    ///
    /// Re-adding an identical (title, artist, duration) triple returns the
    /// existing entry untouched. The catalog is persisted after each new
    /// insertion; a failed write is logged and does not fail the add.
    pub fn add(
        &self,
        title: &str,
        artist: &str,
        file_path: &str,
        source_url: &str,
        info: &TrackInfo,
    ) -> SongEntry {
        let id = unique_id(title, artist, info.duration);
        let entry = {
            let mut guard = self.songs.lock();
            if let Some(existing) = guard.get(&id) {
                return existing.clone();
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("uploader".to_string(), info.uploader.clone().into());
            metadata.insert("channel".to_string(), info.channel.clone().into());
            metadata.insert("view_count".to_string(), info.view_count.into());
            metadata.insert("like_count".to_string(), info.like_count.into());

            let entry = SongEntry {
                unique_id: id.clone(),
                title: title.to_string(),
                artist: artist.to_string(),
                album: info.album.clone(),
                genre: detect_genre(info),
                duration: info.duration,
                year: year_from_upload_date(&info.upload_date),
                file_path: file_path.to_string(),
                file_size: std::fs::metadata(file_path).map(|m| m.len()).unwrap_or(0),
                bitrate: info.bitrate.clone(),
                source_url: source_url.to_string(),
                download_date: chrono::Utc::now().to_rfc3339(),
                tags: info.tags.iter().take(MAX_TAGS).cloned().collect(),
                metadata,
            };
            guard.insert(id, entry.clone());
            entry
        };

        if let Err(e) = self.save() {
            tracing::warn!("Catalog save failed: {}", e);
        }
        entry
    }

    /// Look up one entry by its content key.
    pub fn get(&self, id: &str) -> Option<SongEntry> {
        self.songs.lock().get(id).cloned()
    }

    /// Remove an entry; persists on success.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.songs.lock().remove(id).is_some();
        if removed {
            if let Err(e) = self.save() {
                tracing::warn!("Catalog save failed: {}", e);
            }
        }
        removed
    }

    /// All entries whose genre matches (case-insensitive).
    pub fn songs_by_genre(&self, genre: &str) -> Vec<SongEntry> {
        let wanted = genre.trim().to_lowercase();
        let mut songs: Vec<SongEntry> = self
            .songs
            .lock()
            .values()
            .filter(|song| song.genre.to_lowercase() == wanted)
            .cloned()
            .collect();
        songs.sort_by(|a, b| a.download_date.cmp(&b.download_date));
        songs
    }

    /// All entries, most recent first.
    pub fn all_songs(&self) -> Vec<SongEntry> {
        let mut songs: Vec<SongEntry> = self.songs.lock().values().cloned().collect();
        songs.sort_by(|a, b| b.download_date.cmp(&a.download_date));
        songs
    }

    /// Case-insensitive substring search over title, artist, and tags.
    pub fn search(&self, query: &str) -> Vec<SongEntry> {
        let needle = query.to_lowercase();
        self.songs
            .lock()
            .values()
            .filter(|song| {
                song.title.to_lowercase().contains(&needle)
                    || song.artist.to_lowercase().contains(&needle)
                    || song
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    /// Aggregate statistics over the catalog.
    pub fn statistics(&self) -> CatalogStats {
        let guard = self.songs.lock();
        let total_songs = guard.len();
        let total_artists = guard
            .values()
            .filter(|s| !s.artist.is_empty())
            .map(|s| s.artist.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let total_duration_secs: u64 = guard.values().map(|s| s.duration).sum();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for song in guard.values() {
            *counts.entry(song.genre.clone()).or_default() += 1;
        }
        let mut genres: Vec<(String, usize)> = counts.into_iter().collect();
        genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        CatalogStats {
            total_songs,
            total_artists,
            total_duration_secs,
            total_duration_formatted: format_duration(total_duration_secs),
            genres,
        }
    }
}

/// Render seconds as "1h 2m 3s" (or "2m 3s" / "3s").
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Extract a year from a YYYYMMDD upload date.
fn year_from_upload_date(upload_date: &str) -> u32 {
    upload_date
        .chars()
        .take(4)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}
