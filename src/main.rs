//! Tunedrop - a bulk music download manager.
//!
//! Resolves URLs, playlists, and free-text searches into tracks, downloads
//! them concurrently through yt-dlp, and organizes the results into a
//! genre-aware catalog with per-session history.

pub mod archive;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod orchestrator;
pub mod package;
pub mod progress;
pub mod resolver;
pub mod store;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("tunedrop=info".parse().unwrap()))
        .init();

    cli::run_command(&args)
}
