//! Catalog browsing and maintenance commands.

use crate::catalog::{format_duration, MusicCatalog};
use crate::config::Config;

/// List catalog songs, optionally filtered by genre.
pub fn cmd_catalog_list(config: &Config, genre: Option<&str>) -> anyhow::Result<()> {
    let catalog = MusicCatalog::open(config.catalog_path());
    let songs = match genre {
        Some(genre) => catalog.songs_by_genre(genre),
        None => catalog.all_songs(),
    };
    if songs.is_empty() {
        println!("No songs in the catalog.");
        return Ok(());
    }
    for song in &songs {
        print_song(song);
    }
    println!("\n{} song(s)", songs.len());
    Ok(())
}

/// Search the catalog by title, artist, or tag.
pub fn cmd_catalog_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let catalog = MusicCatalog::open(config.catalog_path());
    let songs = catalog.search(query);
    if songs.is_empty() {
        println!("No matches for {query:?}.");
        return Ok(());
    }
    for song in &songs {
        print_song(song);
    }
    Ok(())
}

/// Print catalog statistics by genre.
pub fn cmd_catalog_stats(config: &Config) -> anyhow::Result<()> {
    let catalog = MusicCatalog::open(config.catalog_path());
    let stats = catalog.statistics();
    println!("Songs:    {}", stats.total_songs);
    println!("Artists:  {}", stats.total_artists);
    println!("Duration: {}", stats.total_duration_formatted);
    if !stats.genres.is_empty() {
        println!("\nBy genre:");
        for (genre, count) in &stats.genres {
            println!("  {genre:<16} {count}");
        }
    }
    Ok(())
}

/// Remove one song entry by id.
pub fn cmd_catalog_remove(config: &Config, id: &str) -> anyhow::Result<()> {
    let catalog = MusicCatalog::open(config.catalog_path());
    if catalog.remove(id) {
        println!("Removed {id}.");
    } else {
        println!("No catalog entry with id {id}.");
    }
    Ok(())
}

fn print_song(song: &crate::catalog::SongEntry) {
    let artist = if song.artist.is_empty() {
        "Unknown artist"
    } else {
        &song.artist
    };
    println!(
        "{}  {} - {} [{}] ({})",
        song.unique_id,
        artist,
        song.title,
        song.genre,
        format_duration(song.duration)
    );
}
