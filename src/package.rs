//! Batch output packaging.
//!
//! After a run, the audio files of a batch directory can be bundled into a
//! single zip placed next to the directory. Only recognized audio files are
//! included; partial downloads, info JSON, and other debris are left out.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};
use crate::model::is_audio_file;

/// Zip the audio files of `output_dir` into a sibling `<dir>.zip`.
///
/// Returns the zip path, or an error when the directory is missing or holds
/// no audio files. Entries are stored flat under the directory's name.
pub fn zip_output_dir(output_dir: &Path) -> Result<PathBuf> {
    if !output_dir.is_dir() {
        return Err(Error::package(format!(
            "not a directory: {}",
            output_dir.display()
        )));
    }

    let mut audio_files: Vec<PathBuf> = walkdir::WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_audio_file(path))
        .collect();
    audio_files.sort();

    if audio_files.is_empty() {
        return Err(Error::package(format!(
            "no audio files in {}",
            output_dir.display()
        )));
    }

    let zip_path = output_dir.with_extension("zip");
    let file = std::fs::File::create(&zip_path)
        .map_err(|e| Error::persist(&zip_path, e.to_string()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let prefix = output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("batch");

    let mut buffer = Vec::new();
    for path in &audio_files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::package(format!("unrepresentable name: {}", path.display())))?;
        writer
            .start_file(format!("{prefix}/{name}"), options)
            .map_err(|e| Error::package(e.to_string()))?;
        let mut source = std::fs::File::open(path)?;
        buffer.clear();
        source.read_to_end(&mut buffer)?;
        writer.write_all(&buffer)?;
    }
    writer.finish().map_err(|e| Error::package(e.to_string()))?;

    Ok(zip_path)
}
