//! Batch download command with live progress output.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::catalog::MusicCatalog;
use crate::config::Config;
use crate::extractor::YtDlpExtractor;
use crate::orchestrator::{BatchOptions, Downloader};
use crate::store;

/// Run one batch download and stream its progress to the terminal.
pub fn cmd_download(
    rt: &Runtime,
    config: &Config,
    input: &[String],
    file: Option<&Path>,
    quality: Option<String>,
    no_zip: bool,
    no_thumbnail: bool,
) -> anyhow::Result<()> {
    let text = gather_input(input, file)?;
    if text.trim().is_empty() {
        anyhow::bail!("No input given. Pass lines as arguments, --file, or stdin.");
    }

    let extractor = YtDlpExtractor::new()?;
    let settings = store::load_settings(&config.settings_path());
    let proxy = store::load_proxy(&config.proxy_path());
    let catalog = Arc::new(MusicCatalog::open(config.catalog_path()));

    let downloader = Downloader::new(
        Arc::new(extractor),
        config.clone(),
        settings,
        proxy.proxy_url(),
        catalog,
    );
    let options = BatchOptions {
        quality,
        embed_thumbnail: no_thumbnail.then_some(false),
        auto_zip: no_zip.then_some(false),
    };

    rt.block_on(async {
        let mut rx = downloader.run_batch(&text, options);
        let mut last = None;
        while let Some(update) = rx.recv().await {
            if !update.finished {
                print!("\r{}        ", update.progress);
                let _ = std::io::stdout().flush();
            }
            last = Some(update);
        }
        println!();
        if let Some(update) = last {
            if !update.items.is_empty() {
                println!("{}", update.items);
                println!();
            }
            println!("{}", update.logs);
            if !update.session.zip_path.is_empty() {
                println!("\nPackaged: {}", update.session.zip_path);
            }
            println!(
                "\nSession {}: {} total, {} completed, {} failed, {} skipped",
                update.session.id,
                update.session.total,
                update.session.completed,
                update.session.failed,
                update.session.skipped
            );
        }
    });
    Ok(())
}

/// Merge positional lines, an optional file, and stdin into one input text.
fn gather_input(input: &[String], file: Option<&Path>) -> anyhow::Result<String> {
    let mut text = input.join("\n");
    match file {
        Some(path) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            text.push('\n');
            text.push_str(&buf);
        }
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            text.push('\n');
            text.push_str(&contents);
        }
        None => {}
    }
    Ok(text)
}
