use anyhow::{Context, Result};
use sftpjail_core::ServiceConfig;
use std::path::Path;
use tokio::fs;

pub async fn load_config(path: &Path) -> Result<ServiceConfig> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let config = ServiceConfig::from_toml(&contents).context("Failed to parse configuration file")?;

    Ok(config)
}

/// Load `path`, or fall back to defaults when it does not exist
///
/// The flag reports whether the file was read.
pub async fn load_or_default(path: &Path) -> Result<(ServiceConfig, bool)> {
    if fs::try_exists(path).await.unwrap_or(false) {
        Ok((load_config(path).await?, true))
    } else {
        Ok((ServiceConfig::default(), false))
    }
}

pub async fn save_config(path: &Path, config: &ServiceConfig) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let contents = config.to_toml().context("Failed to serialize configuration")?;

    fs::write(path, contents)
        .await
        .context("Failed to write configuration file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sftpjail_core::User;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/sftpjail/config.toml");

        let mut config = ServiceConfig::default();
        config.users.push(User::new("alice"));
        save_config(&path, &config).await.unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.users, vec![User::new("alice")]);
        assert_eq!(loaded.host_keys.secret_name, config.host_keys.secret_name);
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");

        assert!(load_config(&path).await.is_err());
        let (config, loaded) = load_or_default(&path).await.unwrap();
        assert!(!loaded);
        assert!(config.users.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "chroots_dir = [").unwrap();

        let err = load_or_default(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse configuration file"));
    }
}
