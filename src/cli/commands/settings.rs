//! Settings and proxy configuration commands.

use crate::config::Config;
use crate::store::{self, ProxyConfig};

const QUALITIES: &[&str] = &["128", "192", "256", "320"];

/// Print the current settings.
pub fn cmd_settings_show(config: &Config) -> anyhow::Result<()> {
    let settings = store::load_settings(&config.settings_path());
    println!("quality:         {} kbps", settings.default_quality);
    println!("embed_thumbnail: {}", settings.embed_thumbnail);
    println!("auto_zip:        {}", settings.auto_zip);
    println!("max_history:     {}", settings.max_history);
    println!("root:            {}", config.root_dir.display());
    Ok(())
}

/// Change one or more settings and persist them.
pub fn cmd_settings_set(
    config: &Config,
    quality: Option<&str>,
    auto_zip: Option<bool>,
    embed_thumbnail: Option<bool>,
    max_history: Option<usize>,
) -> anyhow::Result<()> {
    let mut settings = store::load_settings(&config.settings_path());

    if let Some(quality) = quality {
        if !QUALITIES.contains(&quality) {
            anyhow::bail!("Invalid quality {quality:?}; choose one of {QUALITIES:?}");
        }
        settings.default_quality = quality.to_string();
    }
    if let Some(auto_zip) = auto_zip {
        settings.auto_zip = auto_zip;
    }
    if let Some(embed_thumbnail) = embed_thumbnail {
        settings.embed_thumbnail = embed_thumbnail;
    }
    if let Some(max_history) = max_history {
        if max_history == 0 {
            anyhow::bail!("max_history must be at least 1");
        }
        settings.max_history = max_history;
    }

    store::save_settings(&config.settings_path(), &settings)?;
    println!("Settings saved.");
    cmd_settings_show(config)
}

/// Print the current proxy configuration.
pub fn cmd_proxy_show(config: &Config) -> anyhow::Result<()> {
    let proxy = store::load_proxy(&config.proxy_path());
    if proxy.enabled {
        println!("Proxy: {}", proxy.proxy_url());
    } else {
        println!("Proxy disabled (direct connection).");
    }
    Ok(())
}

/// Enable and persist a proxy.
pub fn cmd_proxy_set(
    config: &Config,
    scheme: &str,
    host: &str,
    port: u16,
    username: Option<&str>,
    password: Option<&str>,
) -> anyhow::Result<()> {
    if host.trim().is_empty() || port == 0 {
        anyhow::bail!("Proxy host and port are required");
    }
    let proxy = ProxyConfig {
        enabled: true,
        scheme: scheme.to_string(),
        host: host.trim().to_string(),
        port,
        username: username.unwrap_or_default().to_string(),
        password: password.unwrap_or_default().to_string(),
    };
    store::save_proxy(&config.proxy_path(), &proxy)?;
    println!("Proxy set to {}", proxy.proxy_url());
    Ok(())
}

/// Disable the proxy, keeping the saved host for later.
pub fn cmd_proxy_disable(config: &Config) -> anyhow::Result<()> {
    let mut proxy = store::load_proxy(&config.proxy_path());
    proxy.enabled = false;
    store::save_proxy(&config.proxy_path(), &proxy)?;
    println!("Proxy disabled.");
    Ok(())
}
