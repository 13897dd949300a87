use anyhow::{Context, Result};
use sftpjail_core::ServiceConfig;
use sftpjail_hostkeys::{FileSecretStore, HostKeyProvisioner, SshKeygen};
use std::path::PathBuf;
use tracing::info;

/// Make sure the host keys exist and are on disk
///
/// NIST Controls:
/// - SC-12: Cryptographic Key Establishment (one identity shared by all replicas)
/// - AU-3: Content of Audit Records (log key provisioning)
pub async fn run(config: &ServiceConfig) -> Result<()> {
    let paths = provision(config).await?;
    for path in &paths {
        println!("{}", path.display());
    }
    Ok(())
}

async fn provision(config: &ServiceConfig) -> Result<Vec<PathBuf>> {
    let host_keys = &config.host_keys;

    info!(
        event = "provision_starting",
        secret = %host_keys.secret_name,
        algorithms = ?host_keys.algorithms,
        store = ?config.secret_store.dir,
        destination = ?host_keys.destination_dir,
        "Provisioning SSH host keys"
    );

    let provisioner = HostKeyProvisioner::new(
        FileSecretStore::new(&config.secret_store.dir),
        SshKeygen::new(&host_keys.keygen_program),
        host_keys.algorithms.clone(),
        &host_keys.work_dir,
    )
    .with_fill_missing(host_keys.fill_missing);

    let paths = provisioner
        .get_or_create(&host_keys.secret_name, &host_keys.destination_dir)
        .await
        .context("Failed to provision host keys")?;

    info!(
        event = "provision_complete",
        count = paths.len(),
        "Host keys provisioned"
    );

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sftpjail_core::Algorithm;
    use tempfile::TempDir;

    fn test_config(dir: &std::path::Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.secret_store.dir = dir.join("secrets");
        config.host_keys.work_dir = dir.join("work");
        config.host_keys.destination_dir = dir.join("etc/ssh");
        config
    }

    #[tokio::test]
    async fn test_provision_with_ssh_keygen() {
        let in_path = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|d| d.join("ssh-keygen").is_file()))
            .unwrap_or(false);
        if !in_path {
            eprintln!("Skipping test: 'ssh-keygen' command not found");
            return;
        }

        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.host_keys.algorithms = vec![Algorithm::Ed25519];

        let first = provision(&config).await.unwrap();
        let key = std::fs::read(&first[0]).unwrap();
        let second = provision(&config).await.unwrap();

        assert_eq!(first, vec![dir.path().join("etc/ssh/ssh_host_ed25519_key")]);
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second[0]).unwrap(), key);
    }

    #[tokio::test]
    async fn test_provision_keygen_failure() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.host_keys.keygen_program = dir.path().join("no-such-keygen");

        let err = provision(&config).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to provision host keys"));
        assert!(!dir.path().join("secrets/sftpjail-host-keys.json").exists());
    }
}
