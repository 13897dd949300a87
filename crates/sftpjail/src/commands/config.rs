use anyhow::{Context, Result, bail};
use sftpjail_core::ServiceConfig;
use std::path::Path;

use crate::config;

pub async fn init(config_path: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(config_path).await.unwrap_or(false) {
        bail!(
            "{} already exists, pass --force to overwrite it",
            config_path.display()
        );
    }

    config::save_config(config_path, &ServiceConfig::default()).await?;
    println!("Configuration file created at: {}", config_path.display());
    println!("\nAdd [[users]] entries before starting the monitor.");
    Ok(())
}

pub async fn check(config_path: &Path) -> Result<()> {
    let config = config::load_config(config_path).await?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    println!(
        "Config OK: {} ({} users, host keys: {})",
        config_path.display(),
        config.users.len(),
        config
            .host_keys
            .algorithms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    );
    Ok(())
}
