//! Core data models for the download engine.
//!
//! Defines the primary entities: [`DownloadItem`], [`DownloadSession`], and
//! [`TrackDescriptor`]. Sessions are serialized into the history document;
//! items live only for the duration of one batch run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of a single download item.
///
/// `Queued` is the initial state; `Completed`, `Failed`, and `Skipped` are
/// terminal and never left once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Waiting for a worker slot
    Queued,
    /// Collaborator is resolving metadata before the transfer starts
    Extracting,
    /// Audio transfer in progress
    Downloading,
    /// Transfer finished, post-processing to the target codec
    Converting,
    /// Audio file produced and recorded
    Completed,
    /// Download or conversion error
    Failed,
    /// Identifier already present in the archive
    Skipped,
}

impl DownloadStatus {
    /// Whether this state can never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Short bracketed tag used in item status lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Queued => "[QUEUED]",
            Self::Extracting => "[EXTRACT]",
            Self::Downloading => "[DOWNLOAD]",
            Self::Converting => "[CONVERT]",
            Self::Completed => "[COMPLETED]",
            Self::Failed => "[FAILED]",
            Self::Skipped => "[SKIPPED]",
        }
    }
}

/// One resolved track awaiting or undergoing download.
///
/// Owned by the orchestrator for a single session; mutated in place by the
/// worker handling it and by the extractor's progress callback. Only the
/// aggregate counters survive into history.
#[derive(Debug, Clone)]
pub struct DownloadItem {
    /// Sequence-derived id, stable within a session (zero-padded)
    pub id: String,
    /// Original input text
    pub query: String,
    /// Resolved URL, or empty for a pure search query
    pub url: String,
    pub status: DownloadStatus,
    pub title: String,
    pub artist: String,
    /// Duration in seconds
    pub duration: u64,
    /// Transfer progress, 0.0 - 100.0
    pub progress: f32,
    /// Display string, e.g. "1.2MiB/s"
    pub speed: String,
    /// Display string, e.g. "00:42"
    pub eta: String,
    /// Truncated error message for failed items
    pub error: String,
    pub file_path: String,
}

impl DownloadItem {
    /// Create a queued item from a resolved descriptor.
    pub fn new(id: String, descriptor: &TrackDescriptor) -> Self {
        let query = if descriptor.title.is_empty() {
            descriptor.url.clone()
        } else {
            descriptor.title.clone()
        };
        Self {
            id,
            query,
            url: descriptor.url.clone(),
            status: DownloadStatus::Queued,
            title: descriptor.title.clone(),
            artist: String::new(),
            duration: descriptor.duration,
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            error: String::new(),
            file_path: String::new(),
        }
    }

    /// Render one display line for the item snapshot, keyed by the item id.
    ///
    /// Exhaustive over [`DownloadStatus`] so new states cannot be forgotten.
    pub fn status_line(&self) -> String {
        let tag = self.status.tag();
        let name: String = if self.title.is_empty() {
            self.query.chars().take(40).collect()
        } else {
            self.title.chars().take(40).collect()
        };
        let body = match self.status {
            DownloadStatus::Downloading => {
                let speed = if self.speed.is_empty() {
                    "0B/s"
                } else {
                    &self.speed
                };
                format!("{tag} {name}... {:.0}% | {speed}", self.progress)
            }
            DownloadStatus::Converting => format!("{tag} {name}... Converting audio"),
            DownloadStatus::Completed => format!("{tag} {name} [Done]"),
            DownloadStatus::Failed => {
                let err: String = self.error.chars().take(30).collect();
                format!("{tag} {name} - {err}")
            }
            DownloadStatus::Skipped => format!("{tag} {name} (already downloaded)"),
            DownloadStatus::Queued | DownloadStatus::Extracting => format!("{tag} {name}"),
        };
        format!("{} {body}", self.id)
    }
}

/// A resolved (url, title, duration) triple produced by playlist expansion,
/// prior to becoming a [`DownloadItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Resolved URL; empty when the input was a bare search query
    pub url: String,
    pub title: String,
    /// Duration in seconds, 0 when unknown
    pub duration: u64,
}

/// Aggregate outcome record of one batch run.
///
/// Counters are updated only by the orchestrator's coordinating task and the
/// record is immutable once appended to history.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DownloadSession {
    /// Short random token
    pub id: String,
    /// RFC 3339 timestamp
    pub started_at: String,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub output_dir: String,
    pub zip_path: String,
}

impl DownloadSession {
    pub fn new(id: String, total: u32, output_dir: &std::path::Path) -> Self {
        Self {
            id,
            started_at: chrono::Utc::now().to_rfc3339(),
            total,
            completed: 0,
            failed: 0,
            skipped: 0,
            output_dir: output_dir.display().to_string(),
            zip_path: String::new(),
        }
    }

    /// Number of items that reached a terminal state.
    pub fn processed(&self) -> u32 {
        self.completed + self.failed + self.skipped
    }
}

/// Audio extensions recognized for packaging and file listings.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "flac"];

/// Check if a path has a recognized audio file extension.
pub fn is_audio_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Check for audio or packaged-archive extensions (file listings).
pub fn is_listable_file(path: &std::path::Path) -> bool {
    is_audio_file(path)
        || path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Build the timestamped output directory path for a new batch.
pub fn batch_output_dir(root: &std::path::Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    root.join(format!("batch_{stamp}"))
}
