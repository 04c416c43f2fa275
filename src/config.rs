//! Environment-level configuration.
//!
//! Read once at startup from environment variables, with sensible defaults:
//! - `TUNEDROP_ROOT`     - root output directory (default: ~/music_downloads)
//! - `TUNEDROP_WORKERS`  - concurrent download workers (default: 8)
//! - `TUNEDROP_TIMEOUT`  - network timeout in seconds (default: 15)
//! - `TUNEDROP_ARCHIVE`  - path to the download archive file
//!
//! Persisted user settings (quality, auto-zip, ...) are a separate concern,
//! handled by [`crate::store`]. Loading never fails - bad values fall back
//! to defaults with a warning.

use std::path::PathBuf;

/// Default number of concurrent download workers.
pub const DEFAULT_WORKERS: usize = 8;

/// Default network timeout passed to the extraction collaborator.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Runtime configuration for one process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for batch output directories and persisted documents
    pub root_dir: PathBuf,
    /// Bounded worker pool size
    pub max_workers: usize,
    /// Network timeout in seconds, forwarded to the extractor
    pub timeout_secs: u64,
    /// Append-only archive of downloaded item identifiers
    pub archive_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let root_dir = std::env::var("TUNEDROP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_root());

        let max_workers = parse_env("TUNEDROP_WORKERS", DEFAULT_WORKERS);
        let timeout_secs = parse_env("TUNEDROP_TIMEOUT", DEFAULT_TIMEOUT_SECS);

        let archive_path = std::env::var("TUNEDROP_ARCHIVE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| root_dir.join("downloaded.archive"));

        Self {
            root_dir,
            max_workers: max_workers.max(1),
            timeout_secs,
            archive_path,
        }
    }

    /// Configuration rooted at an explicit directory (tests, overrides).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root_dir = root.into();
        Self {
            archive_path: root_dir.join("downloaded.archive"),
            root_dir,
            max_workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Path of the catalog JSON document.
    pub fn catalog_path(&self) -> PathBuf {
        self.root_dir.join("music_catalog.json")
    }

    /// Path of the session history JSON document.
    pub fn history_path(&self) -> PathBuf {
        self.root_dir.join("download_history.json")
    }

    /// Path of the user settings JSON document.
    pub fn settings_path(&self) -> PathBuf {
        self.root_dir.join("user_settings.json")
    }

    /// Path of the proxy configuration JSON document.
    pub fn proxy_path(&self) -> PathBuf {
        self.root_dir.join("proxy_config.json")
    }

    /// Ensure the root directory (and archive parent) exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root_dir)?;
        if let Some(parent) = self.archive_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_root(default_root())
    }
}

fn default_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("music_downloads")
}

/// Parse a numeric environment variable, warning on malformed values.
fn parse_env<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Ignoring malformed {}={:?}, using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_root_derives_paths() {
        let config = Config::with_root("/data/music");
        assert_eq!(config.root_dir, PathBuf::from("/data/music"));
        assert_eq!(
            config.archive_path,
            PathBuf::from("/data/music/downloaded.archive")
        );
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/data/music/music_catalog.json")
        );
        assert_eq!(
            config.history_path(),
            PathBuf::from("/data/music/download_history.json")
        );
        assert_eq!(
            config.settings_path(),
            PathBuf::from("/data/music/user_settings.json")
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::with_root("/tmp/x");
        assert_eq!(config.max_workers, DEFAULT_WORKERS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path().join("nested/root"));
        config.ensure_dirs().unwrap();
        assert!(config.root_dir.is_dir());
    }
}
