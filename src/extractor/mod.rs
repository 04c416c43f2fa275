//! Extraction collaborator seam.
//!
//! The engine that actually fetches and transcodes audio is external. This
//! module defines OUR types for talking to it - a narrow request/metadata
//! contract - so the orchestrator never depends on any particular tool's
//! surface. Production code uses [`ytdlp::YtDlpExtractor`]; tests substitute
//! mock implementations of [`MediaExtractor`].

pub mod ytdlp;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub use ytdlp::YtDlpExtractor;

/// Prefix turning free text into a search query the collaborator understands.
pub const SEARCH_PREFIX: &str = "ytsearch:";

/// Errors reported by the extraction collaborator.
///
/// `AlreadyDownloaded` is distinguished from all other failures so that
/// session counters can separate skips from errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The item's identifier is already present in the archive
    #[error("already downloaded")]
    AlreadyDownloaded,

    /// The collaborator returned no metadata for the item
    #[error("No info extracted")]
    NoInfo,

    /// The extraction tool binary could not be located
    #[error("extraction tool not found: {0}")]
    ToolMissing(String),

    /// Any other collaborator-reported failure
    #[error("{0}")]
    Failed(String),
}

/// Phase notification streamed from the collaborator while a job runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Transfer in progress
    Downloading {
        percent: f32,
        speed: String,
        eta: String,
    },
    /// Transfer done, post-processing started
    Finished,
    /// Collaborator signalled an error for this item
    Errored,
}

/// Per-item progress callback, invoked from the worker running the job.
pub type ProgressHook = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Semantic options for one download job.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Direct URL, or a [`SEARCH_PREFIX`]-prefixed query string
    pub target: String,
    /// Directory receiving the output file
    pub output_dir: PathBuf,
    /// Desired lossy bitrate in kbps, e.g. "320"
    pub quality: String,
    /// Append-only archive consulted and updated by the collaborator
    pub archive_path: PathBuf,
    /// Embed thumbnail art into the produced file
    pub embed_thumbnail: bool,
    /// Retry count for the transfer and its fragments
    pub retries: u32,
    /// Network timeout in seconds
    pub timeout_secs: u64,
    /// Proxy URL, empty for a direct connection
    pub proxy_url: String,
}

/// One entry of an expanded playlist (metadata-only mode).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Seconds, 0 when unknown
    pub duration: u64,
}

/// Metadata returned by the collaborator after a successful download.
///
/// These are our types, not the tool's JSON shape - the adapter in
/// [`ytdlp`] converts. Fields beyond title/artist/duration feed catalog
/// genre inference and the free-form metadata map.
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    /// Seconds
    pub duration: u64,
    pub album: String,
    pub genre: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub description: String,
    /// YYYYMMDD as reported by the source
    pub upload_date: String,
    pub uploader: String,
    pub channel: String,
    pub view_count: u64,
    pub like_count: u64,
    /// Average bitrate display string
    pub bitrate: String,
    pub source_url: String,
    /// Path of the produced audio file, when known
    pub file_path: String,
}

impl TrackInfo {
    /// Minimal info carrying just identity fields (tests, fallbacks).
    pub fn titled(title: &str, artist: &str, duration: u64) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            duration,
            ..Default::default()
        }
    }
}

/// The extraction collaborator contract.
///
/// Implementations must skip (and report as [`ExtractError::AlreadyDownloaded`])
/// any item whose identifier is already present in the archive file, and must
/// append identifiers on success.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Expand a playlist/collection URL without fetching audio.
    ///
    /// Returns entries in playlist order.
    async fn expand_playlist(&self, url: &str) -> Result<Vec<PlaylistEntry>, ExtractError>;

    /// Fetch and transcode one item, streaming phase updates to `progress`.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: ProgressHook,
    ) -> Result<TrackInfo, ExtractError>;
}

/// Mock extractor for orchestrator and resolver tests.
///
/// Outcomes are keyed by the request target; unmatched targets use the
/// default outcome.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// What the mock should do for a given target.
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        Complete(TrackInfo),
        AlreadyDownloaded,
        NoInfo,
        Fail(String),
    }

    /// Configurable [`MediaExtractor`] double.
    pub struct MockExtractor {
        /// Entries returned from playlist expansion
        pub playlist: Vec<PlaylistEntry>,
        /// Error returned from expansion (takes precedence over entries)
        pub playlist_error: Option<ExtractError>,
        /// Per-target outcomes
        pub outcomes: HashMap<String, MockOutcome>,
        /// Outcome for targets with no specific entry
        pub default_outcome: MockOutcome,
        /// Progress events emitted before resolving each download
        pub events: Vec<ProgressEvent>,
    }

    impl MockExtractor {
        /// A mock that completes every download with a derived title.
        pub fn completing() -> Self {
            Self {
                playlist: vec![],
                playlist_error: None,
                outcomes: HashMap::new(),
                default_outcome: MockOutcome::Complete(TrackInfo::titled(
                    "Mock Track",
                    "Mock Artist",
                    180,
                )),
                events: vec![],
            }
        }

        /// A mock whose playlist expansion fails.
        pub fn failing_expansion(error: ExtractError) -> Self {
            Self {
                playlist_error: Some(error),
                ..Self::completing()
            }
        }

        /// A mock expanding playlists into the given entries.
        pub fn with_playlist(entries: Vec<PlaylistEntry>) -> Self {
            Self {
                playlist: entries,
                ..Self::completing()
            }
        }

        /// Set the outcome for a specific target.
        pub fn outcome(mut self, target: &str, outcome: MockOutcome) -> Self {
            self.outcomes.insert(target.to_string(), outcome);
            self
        }
    }

    #[async_trait]
    impl MediaExtractor for MockExtractor {
        async fn expand_playlist(&self, _url: &str) -> Result<Vec<PlaylistEntry>, ExtractError> {
            if let Some(ref err) = self.playlist_error {
                return Err(err.clone());
            }
            Ok(self.playlist.clone())
        }

        async fn download(
            &self,
            request: &DownloadRequest,
            progress: ProgressHook,
        ) -> Result<TrackInfo, ExtractError> {
            for event in &self.events {
                progress(event.clone());
            }
            let outcome = self
                .outcomes
                .get(&request.target)
                .unwrap_or(&self.default_outcome);
            match outcome {
                MockOutcome::Complete(info) => Ok(info.clone()),
                MockOutcome::AlreadyDownloaded => Err(ExtractError::AlreadyDownloaded),
                MockOutcome::NoInfo => Err(ExtractError::NoInfo),
                MockOutcome::Fail(msg) => Err(ExtractError::Failed(msg.clone())),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_default_outcome() {
            let mock = MockExtractor::completing();
            let request = DownloadRequest {
                target: "https://example.com/watch?v=1".to_string(),
                output_dir: PathBuf::from("/tmp"),
                quality: "320".to_string(),
                archive_path: PathBuf::from("/tmp/archive"),
                embed_thumbnail: false,
                retries: 3,
                timeout_secs: 15,
                proxy_url: String::new(),
            };
            let info = mock.download(&request, Arc::new(|_| {})).await.unwrap();
            assert_eq!(info.title, "Mock Track");
        }

        #[tokio::test]
        async fn test_mock_per_target_outcome() {
            let mock = MockExtractor::completing()
                .outcome("skip-me", MockOutcome::AlreadyDownloaded)
                .outcome("break-me", MockOutcome::Fail("network".to_string()));
            let mut request = DownloadRequest {
                target: "skip-me".to_string(),
                output_dir: PathBuf::from("/tmp"),
                quality: "320".to_string(),
                archive_path: PathBuf::from("/tmp/archive"),
                embed_thumbnail: false,
                retries: 3,
                timeout_secs: 15,
                proxy_url: String::new(),
            };
            let err = mock
                .download(&request, Arc::new(|_| {}))
                .await
                .unwrap_err();
            assert_eq!(err, ExtractError::AlreadyDownloaded);

            request.target = "break-me".to_string();
            let err = mock
                .download(&request, Arc::new(|_| {}))
                .await
                .unwrap_err();
            assert!(matches!(err, ExtractError::Failed(_)));
        }

        #[tokio::test]
        async fn test_mock_expansion_error() {
            let mock =
                MockExtractor::failing_expansion(ExtractError::Failed("timeout".to_string()));
            assert!(mock.expand_playlist("https://x/playlist").await.is_err());
        }

        #[tokio::test]
        async fn test_mock_streams_events_through_the_hook() {
            let mock = MockExtractor {
                events: vec![
                    ProgressEvent::Downloading {
                        percent: 42.5,
                        speed: "1.2MiB/s".to_string(),
                        eta: "00:05".to_string(),
                    },
                    ProgressEvent::Finished,
                ],
                ..MockExtractor::completing()
            };
            let request = DownloadRequest {
                target: "https://example.com/watch?v=1".to_string(),
                output_dir: PathBuf::from("/tmp"),
                quality: "320".to_string(),
                archive_path: PathBuf::from("/tmp/archive"),
                embed_thumbnail: false,
                retries: 3,
                timeout_secs: 15,
                proxy_url: String::new(),
            };
            let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let hook: ProgressHook = Arc::new(move |event| {
                sink.lock().unwrap().push(event);
            });

            mock.download(&request, hook).await.unwrap();
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert!(matches!(
                seen[0],
                ProgressEvent::Downloading { percent, .. } if percent == 42.5
            ));
            assert!(matches!(seen[1], ProgressEvent::Finished));
        }
    }
}
