//! yt-dlp backed implementation of [`MediaExtractor`].
//!
//! This module shells out to the `yt-dlp` command-line tool. Shelling out is
//! more reliable than bindings and works on every platform where the tool is
//! installed. Playlist expansion uses flat-playlist JSON mode; downloads run
//! with line-buffered progress output that is parsed into [`ProgressEvent`]s.
//!
//! Install yt-dlp:
//! - Windows: `winget install yt-dlp`
//! - macOS: `brew install yt-dlp`
//! - Linux: `apt install yt-dlp` or `pip install yt-dlp`

use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::{
    DownloadRequest, ExtractError, MediaExtractor, PlaylistEntry, ProgressEvent, ProgressHook,
    TrackInfo,
};

/// Common installation paths for yt-dlp on Windows
#[cfg(windows)]
const YTDLP_PATHS: &[&str] = &[
    "yt-dlp", // In PATH
    r"C:\Program Files\yt-dlp\yt-dlp.exe",
    r"C:\ProgramData\chocolatey\bin\yt-dlp.exe",
];

#[cfg(not(windows))]
const YTDLP_PATHS: &[&str] = &[
    "yt-dlp", // In PATH
    "/usr/bin/yt-dlp",
    "/usr/local/bin/yt-dlp",
    "/opt/homebrew/bin/yt-dlp",
];

/// Marker yt-dlp prints when the archive already records an item.
const ARCHIVE_MARKER: &str = "has already been recorded in the archive";

/// Find the yt-dlp executable, checking common installation paths.
fn find_ytdlp() -> Option<&'static str> {
    YTDLP_PATHS
        .iter()
        .find(|&path| {
            std::process::Command::new(path)
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
        .map(|v| v as _)
}

/// Extraction collaborator backed by the yt-dlp binary.
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    /// Locate yt-dlp and build an extractor.
    pub fn new() -> Result<Self, ExtractError> {
        let binary = find_ytdlp().ok_or_else(|| {
            ExtractError::ToolMissing(
                "yt-dlp not found. Install it from https://github.com/yt-dlp/yt-dlp".to_string(),
            )
        })?;
        Ok(Self {
            binary: binary.to_string(),
        })
    }

    /// Get the tool version string (for diagnostics).
    pub fn version(&self) -> Option<String> {
        std::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn expand_playlist(&self, url: &str) -> Result<Vec<PlaylistEntry>, ExtractError> {
        let output = Command::new(&self.binary)
            .args(["-J", "--flat-playlist", "--no-warnings", "--ignore-errors"])
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::Failed(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Failed(truncate(stderr.trim(), 200)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_flat_playlist(&stdout, url)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: ProgressHook,
    ) -> Result<TrackInfo, ExtractError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-f", "bestaudio[ext=m4a]/bestaudio/best"])
            .args(["-x", "--audio-format", "mp3"])
            .args(["--audio-quality", &format!("{}K", request.quality)])
            .arg("-o")
            .arg(request.output_dir.join("%(title)s.%(ext)s"))
            .arg("--download-archive")
            .arg(&request.archive_path)
            .args(["--retries", &request.retries.to_string()])
            .args(["--fragment-retries", &request.retries.to_string()])
            .args(["--socket-timeout", &request.timeout_secs.to_string()])
            .args(["--no-playlist", "--no-warnings", "--no-color", "--newline"])
            .arg("--print-json");
        if request.embed_thumbnail {
            cmd.args(["--embed-thumbnail", "--add-metadata"]);
        }
        if !request.proxy_url.is_empty() {
            cmd.args(["--proxy", &request.proxy_url]);
        }
        cmd.arg(&request.target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ExtractError::Failed(format!("failed to run yt-dlp: {e}")))?;

        // Stderr is drained concurrently so the child never blocks on a full pipe.
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ExtractError::Failed("yt-dlp stderr not captured".to_string())
        })?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let stdout = child.stdout.take().ok_or_else(|| {
            ExtractError::Failed("yt-dlp stdout not captured".to_string())
        })?;
        let mut lines = BufReader::new(stdout).lines();

        let mut info_json: Option<String> = None;
        let mut saw_archive_marker = false;

        while let Ok(Some(line)) = lines.next_line().await {
            if line.contains(ARCHIVE_MARKER) {
                saw_archive_marker = true;
            } else if line.starts_with("[download]") {
                if let Some(event) = parse_progress_line(&line) {
                    progress(event);
                }
            } else if line.starts_with("[ExtractAudio]") || line.starts_with("[ffmpeg]") {
                progress(ProgressEvent::Finished);
            } else if line.starts_with('{') {
                info_json = Some(line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExtractError::Failed(format!("yt-dlp wait failed: {e}")))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if saw_archive_marker {
            return Err(ExtractError::AlreadyDownloaded);
        }
        if !status.success() {
            progress(ProgressEvent::Errored);
            let text = stderr_text.trim();
            if text.to_lowercase().contains("already") {
                return Err(ExtractError::AlreadyDownloaded);
            }
            return Err(ExtractError::Failed(truncate(text, 200)));
        }

        match info_json {
            Some(json) => parse_info_json(&json),
            None => Err(ExtractError::NoInfo),
        }
    }
}

// ============================================================================
// Output parsing
// ============================================================================

#[derive(Deserialize)]
struct FlatEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Option<Vec<Option<FlatEntry>>>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl FlatEntry {
    fn into_playlist_entry(self) -> PlaylistEntry {
        PlaylistEntry {
            url: self.url.or(self.webpage_url).unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            duration: self.duration.unwrap_or(0.0).round() as u64,
            id: self.id,
        }
    }
}

/// Parse `-J --flat-playlist` output into ordered entries.
///
/// A non-playlist URL returns a single entry describing the item itself.
fn parse_flat_playlist(json: &str, url: &str) -> Result<Vec<PlaylistEntry>, ExtractError> {
    let parsed: FlatPlaylist = serde_json::from_str(json)
        .map_err(|e| ExtractError::Failed(format!("bad playlist JSON: {e}")))?;

    match parsed.entries {
        Some(entries) => Ok(entries
            .into_iter()
            .flatten()
            .map(FlatEntry::into_playlist_entry)
            .collect()),
        None => Ok(vec![PlaylistEntry {
            url: parsed.webpage_url.unwrap_or_else(|| url.to_string()),
            title: parsed.title.unwrap_or_default(),
            duration: parsed.duration.unwrap_or(0.0).round() as u64,
            id: parsed.id,
        }]),
    }
}

#[derive(Deserialize)]
struct InfoJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    view_count: Option<u64>,
    #[serde(default)]
    like_count: Option<u64>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default, rename = "_filename")]
    filename: Option<String>,
}

/// Convert the tool's info JSON into our [`TrackInfo`].
fn parse_info_json(json: &str) -> Result<TrackInfo, ExtractError> {
    let parsed: InfoJson =
        serde_json::from_str(json).map_err(|e| ExtractError::Failed(format!("bad info JSON: {e}")))?;

    let uploader = parsed.uploader.unwrap_or_default();
    let artist = parsed.artist.unwrap_or_else(|| uploader.clone());
    // The reported filename is pre-conversion; the post-processor swaps the
    // extension to mp3.
    let file_path = parsed
        .filename
        .map(|f| {
            std::path::Path::new(&f)
                .with_extension("mp3")
                .display()
                .to_string()
        })
        .unwrap_or_default();

    Ok(TrackInfo {
        title: parsed.title,
        artist,
        duration: parsed.duration.unwrap_or(0.0).round() as u64,
        album: parsed.album.unwrap_or_default(),
        genre: parsed.genre.unwrap_or_default(),
        tags: parsed.tags,
        categories: parsed.categories,
        description: parsed.description,
        upload_date: parsed.upload_date.unwrap_or_default(),
        uploader,
        channel: parsed.channel.unwrap_or_default(),
        view_count: parsed.view_count.unwrap_or(0),
        like_count: parsed.like_count.unwrap_or(0),
        bitrate: parsed
            .abr
            .map(|b| format!("{b:.0}"))
            .unwrap_or_default(),
        source_url: parsed.webpage_url.unwrap_or_default(),
        file_path,
    })
}

/// Parse one `[download]` progress line.
///
/// Example: `[download]  42.5% of 3.50MiB at 1.23MiB/s ETA 00:05`
fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let mut percent = None;
    let mut speed = String::new();
    let mut eta = String::new();

    let tokens: Vec<&str> = line.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if let Some(raw) = token.strip_suffix('%') {
            percent = raw.parse::<f32>().ok();
        } else if *token == "at" {
            if let Some(next) = tokens.get(i + 1) {
                speed = next.to_string();
            }
        } else if *token == "ETA" {
            if let Some(next) = tokens.get(i + 1) {
                eta = next.to_string();
            }
        }
    }

    percent.map(|percent| ProgressEvent::Downloading {
        percent,
        speed,
        eta,
    })
}

/// Truncate a message to at most `max` characters.
fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
