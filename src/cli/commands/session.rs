//! History, statistics, file listing, and archive commands.

use crate::archive::ArchiveStore;
use crate::catalog::MusicCatalog;
use crate::config::Config;
use crate::model::is_listable_file;
use crate::store::{self, SessionHistory};

/// Show or clear past download sessions.
pub fn cmd_history(config: &Config, limit: usize, clear: bool) -> anyhow::Result<()> {
    let settings = store::load_settings(&config.settings_path());
    let mut history = SessionHistory::open(config.history_path(), settings.max_history);

    if clear {
        history.clear()?;
        println!("History cleared.");
        return Ok(());
    }
    if history.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }
    for session in history.recent(limit) {
        println!(
            "{}  {}  {} total | {} ok, {} failed, {} skipped  -> {}",
            session.id,
            session.started_at,
            session.total,
            session.completed,
            session.failed,
            session.skipped,
            session.output_dir
        );
    }
    Ok(())
}

/// Lifetime statistics across sessions plus catalog totals.
pub fn cmd_stats(config: &Config) -> anyhow::Result<()> {
    let settings = store::load_settings(&config.settings_path());
    let history = SessionHistory::open(config.history_path(), settings.max_history);
    let catalog = MusicCatalog::open(config.catalog_path());

    let stats = history.lifetime_stats();
    let catalog_stats = catalog.statistics();
    println!(
        "{}",
        store::format_lifetime(&stats, catalog_stats.total_duration_secs)
    );
    println!(
        "Catalog: {} songs by {} artists",
        catalog_stats.total_songs, catalog_stats.total_artists
    );
    Ok(())
}

/// List audio files and zips under the root directory.
pub fn cmd_files(config: &Config) -> anyhow::Result<()> {
    let mut files: Vec<(std::path::PathBuf, u64)> = walkdir::WalkDir::new(&config.root_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_listable_file(entry.path()))
        .filter_map(|entry| {
            let size = entry.metadata().ok()?.len();
            Some((entry.into_path(), size))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        println!("No downloaded files under {}.", config.root_dir.display());
        return Ok(());
    }
    const FILES_SHOWN: usize = 100;
    let total: u64 = files.iter().map(|(_, size)| size).sum();
    for (path, size) in files.iter().take(FILES_SHOWN) {
        let relative = path.strip_prefix(&config.root_dir).unwrap_or(path);
        println!("{:>10}  {}", format_size(*size), relative.display());
    }
    if files.len() > FILES_SHOWN {
        println!("... +{} more", files.len() - FILES_SHOWN);
    }
    println!("\n{} file(s), {}", files.len(), format_size(total));
    Ok(())
}

/// Print the number of archived identifiers.
pub fn cmd_archive_count(config: &Config) -> anyhow::Result<()> {
    let archive = ArchiveStore::new(&config.archive_path);
    println!("{} identifier(s) in the archive.", archive.len());
    Ok(())
}

/// Delete the archive file.
pub fn cmd_archive_clear(config: &Config) -> anyhow::Result<()> {
    let archive = ArchiveStore::new(&config.archive_path);
    if archive.clear()? {
        println!("Archive cleared. Everything can be re-downloaded.");
    } else {
        println!("Archive was already empty.");
    }
    Ok(())
}

/// Render a byte count as B/KiB/MiB/GiB.
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
