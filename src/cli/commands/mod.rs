//! CLI command definitions and dispatch.
//!
//! Each command group is implemented in its own submodule:
//! - `download`: batch downloads with live progress
//! - `catalog`: browsing and maintaining the music catalog
//! - `session`: history, statistics, files, and the download archive
//! - `settings`: persisted preferences and proxy configuration

mod catalog;
mod download;
mod session;
mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use catalog::{cmd_catalog_list, cmd_catalog_remove, cmd_catalog_search, cmd_catalog_stats};
pub use download::cmd_download;
pub use session::{cmd_archive_clear, cmd_archive_count, cmd_files, cmd_history, cmd_stats};
pub use settings::{cmd_proxy_set, cmd_proxy_show, cmd_settings_set, cmd_settings_show};

use crate::config::Config;

/// Tunedrop CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Download tracks from URLs, playlists, or search queries
    Download {
        /// Input lines (URLs, playlist URLs, or free-text searches)
        input: Vec<String>,
        /// Read input lines from a file instead ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Target bitrate in kbps, overriding the saved setting
        #[arg(short, long)]
        quality: Option<String>,
        /// Skip zip packaging for this run
        #[arg(long)]
        no_zip: bool,
        /// Skip thumbnail embedding for this run
        #[arg(long)]
        no_thumbnail: bool,
    },
    /// Show past download sessions
    History {
        /// Number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Clear the session history instead of listing it
        #[arg(long)]
        clear: bool,
    },
    /// Lifetime download and catalog statistics
    Stats,
    /// Browse and maintain the music catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// List downloaded audio files and zips under the root directory
    Files,
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Inspect or reset the download archive
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },
    /// Show or change the proxy configuration
    Proxy {
        #[command(subcommand)]
        command: ProxyCommands,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List songs, optionally filtered by genre
    List {
        /// Genre filter (case-insensitive)
        #[arg(short, long)]
        genre: Option<String>,
    },
    /// Search songs by title, artist, or tag
    Search {
        /// Search text
        query: String,
    },
    /// Catalog statistics by genre
    Stats,
    /// Remove one song entry by id
    Remove {
        /// Catalog id (16 hex chars)
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        /// Target bitrate in kbps ("128", "192", "256", "320")
        #[arg(long)]
        quality: Option<String>,
        /// Package batches into zips after each run
        #[arg(long)]
        auto_zip: Option<bool>,
        /// Embed thumbnail art into produced files
        #[arg(long)]
        embed_thumbnail: Option<bool>,
        /// Number of sessions retained in history
        #[arg(long)]
        max_history: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// Number of recorded identifiers
    Count,
    /// Delete the archive so everything can be re-downloaded
    Clear,
}

#[derive(Subcommand)]
pub enum ProxyCommands {
    /// Print the current proxy configuration
    Show,
    /// Enable a proxy for the extraction tool
    Set {
        /// Proxy host
        host: String,
        /// Proxy port
        port: u16,
        /// Proxy scheme (http, socks5)
        #[arg(long, default_value = "http")]
        scheme: String,
        /// Proxy username
        #[arg(long)]
        username: Option<String>,
        /// Proxy password
        #[arg(long)]
        password: Option<String>,
    },
    /// Disable the proxy
    Disable,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = Config::from_env();
    config.ensure_dirs()?;

    match &cli.command {
        Commands::Download {
            input,
            file,
            quality,
            no_zip,
            no_thumbnail,
        } => cmd_download(
            &rt,
            &config,
            input,
            file.as_deref(),
            quality.clone(),
            *no_zip,
            *no_thumbnail,
        ),
        Commands::History { limit, clear } => cmd_history(&config, *limit, *clear),
        Commands::Stats => cmd_stats(&config),
        Commands::Catalog { command } => match command {
            CatalogCommands::List { genre } => cmd_catalog_list(&config, genre.as_deref()),
            CatalogCommands::Search { query } => cmd_catalog_search(&config, query),
            CatalogCommands::Stats => cmd_catalog_stats(&config),
            CatalogCommands::Remove { id } => cmd_catalog_remove(&config, id),
        },
        Commands::Files => cmd_files(&config),
        Commands::Settings { command } => match command {
            SettingsCommands::Show => cmd_settings_show(&config),
            SettingsCommands::Set {
                quality,
                auto_zip,
                embed_thumbnail,
                max_history,
            } => cmd_settings_set(
                &config,
                quality.as_deref(),
                *auto_zip,
                *embed_thumbnail,
                *max_history,
            ),
        },
        Commands::Archive { command } => match command {
            ArchiveCommands::Count => cmd_archive_count(&config),
            ArchiveCommands::Clear => cmd_archive_clear(&config),
        },
        Commands::Proxy { command } => match command {
            ProxyCommands::Show => cmd_proxy_show(&config),
            ProxyCommands::Set {
                host,
                port,
                scheme,
                username,
                password,
            } => cmd_proxy_set(
                &config,
                scheme,
                host,
                *port,
                username.as_deref(),
                password.as_deref(),
            ),
            ProxyCommands::Disable => settings::cmd_proxy_disable(&config),
        },
    }
}
