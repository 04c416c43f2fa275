//! Append-only archive of downloaded item identifiers.
//!
//! The archive is a newline-delimited file of opaque ids, shared across
//! sessions. The extraction collaborator reads and appends it itself during
//! downloads; this store exists for inspection and maintenance commands
//! (count, contains, clear). Concurrent appends across runs are tolerated
//! because records are whole lines and the file is never rewritten in place.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Handle to the archive file.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path handed to the extraction collaborator.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the recorded identifiers. A missing file is an empty archive.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Number of recorded identifiers.
    pub fn len(&self) -> usize {
        self.load().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an identifier is already recorded.
    pub fn contains(&self, id: &str) -> bool {
        self.load()
            .map(|ids| ids.iter().any(|known| known == id))
            .unwrap_or(false)
    }

    /// Append one identifier.
    pub fn append(&self, id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::persist(&self.path, e.to_string()))?;
        writeln!(file, "{id}").map_err(|e| Error::persist(&self.path, e.to_string()))?;
        Ok(())
    }

    /// Delete the archive file. Returns whether anything was removed.
    pub fn clear(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
