//! Host key provisioning
//!
//! NIST 800-53: SC-12 (Cryptographic Key Establishment), SC-28 (Protection of Information at Rest)
//! STIG: V-222596 - Private key files must be readable by their owner only
//! Implementation: Get-or-generate host keys through the shared secret store,
//! then materialize the stored private keys on the local filesystem

use crate::error::{HostKeyError, Result};
use crate::keygen::KeyGenerator;
use crate::store::{Secret, SecretStore};
use sftpjail_core::{Algorithm, PUBLIC_KEY_SUFFIX};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Mode for materialized private keys
const PRIVATE_KEY_MODE: u32 = 0o600;

/// Obtains the SSH host identity from the secret store, generating and
/// storing it on first use
pub struct HostKeyProvisioner<S, G> {
    store: S,
    generator: G,
    algorithms: Vec<Algorithm>,
    work_dir: PathBuf,
    fill_missing: bool,
}

impl<S: SecretStore, G: KeyGenerator> HostKeyProvisioner<S, G> {
    /// Create a provisioner for `algorithms`
    ///
    /// Generated keys are staged under `<work_dir>/etc/ssh` before being
    /// stored.
    pub fn new(
        store: S,
        generator: G,
        algorithms: Vec<Algorithm>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            generator,
            algorithms,
            work_dir: work_dir.into(),
            fill_missing: false,
        }
    }

    /// Also generate keys for configured algorithms missing from an
    /// existing secret, and update the secret with them
    #[must_use]
    pub fn with_fill_missing(mut self, fill_missing: bool) -> Self {
        self.fill_missing = fill_missing;
        self
    }

    /// Ensure the host keys exist in `secret_name` and write the private
    /// keys into `destination_dir`
    ///
    /// Safe to call on every start. Keys are generated at most once per call,
    /// and only when the secret does not exist. The files on disk are always
    /// written from the stored copy, never straight from the generator, so
    /// stored and on-disk keys are identical.
    ///
    /// # Returns
    ///
    /// Paths of the private keys written, sorted by file name
    ///
    /// # Errors
    ///
    /// Store failures other than "not found", generation failures and
    /// filesystem errors are all fatal.
    pub async fn get_or_create(
        &self,
        secret_name: &str,
        destination_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut generated = false;

        loop {
            match self.store.get(secret_name).await {
                Ok(secret) => {
                    let missing = self.missing_algorithms(&secret);
                    let secret = if missing.is_empty() {
                        secret
                    } else if self.fill_missing {
                        self.fill_missing_keys(secret, &missing).await?
                    } else {
                        return Err(HostKeyError::MissingAlgorithms {
                            name: secret_name.to_string(),
                            algorithms: missing,
                        });
                    };
                    return self.materialize(&secret, destination_dir).await;
                }
                Err(e) if e.is_not_found() && generated => {
                    return Err(HostKeyError::SecretVanished(secret_name.to_string()));
                }
                Err(e) if e.is_not_found() => {
                    info!(
                        event = "host_keys_generating",
                        secret = secret_name,
                        algorithms = ?self.algorithms,
                        "Host key secret not found, generating keys"
                    );
                    let secret = self.generate_secret(secret_name).await?;
                    match self.store.create(&secret).await {
                        Ok(_) => info!(
                            event = "host_keys_secret_created",
                            secret = secret_name,
                            entries = secret.data.len(),
                            "Created host key secret"
                        ),
                        // Another replica created it first; adopt its keys
                        Err(e) if e.is_conflict() => warn!(
                            event = "host_keys_secret_conflict",
                            secret = secret_name,
                            "Host key secret was created concurrently, re-reading"
                        ),
                        Err(e) => {
                            return Err(HostKeyError::store("creating secret", secret_name, e));
                        }
                    }
                    generated = true;
                }
                Err(e) => return Err(HostKeyError::store("getting secret", secret_name, e)),
            }
        }
    }

    fn keys_dir(&self) -> PathBuf {
        self.work_dir.join("etc").join("ssh")
    }

    /// Generate a key pair for every algorithm and collect the files
    async fn generate_secret(&self, secret_name: &str) -> Result<Secret> {
        let mut secret = Secret::new(secret_name);
        self.generate_into(&mut secret, &self.algorithms).await?;
        Ok(secret)
    }

    async fn generate_into(&self, secret: &mut Secret, algorithms: &[Algorithm]) -> Result<()> {
        let keys_dir = self.keys_dir();
        tokio::fs::create_dir_all(&keys_dir).await?;

        for &algorithm in algorithms {
            self.generator.generate(algorithm, &keys_dir).await?;

            let private_path = keys_dir.join(algorithm.private_key_name());
            let private = match tokio::fs::read(&private_path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(HostKeyError::MissingKeyFile(private_path));
                }
                Err(e) => return Err(e.into()),
            };
            secret.data.insert(algorithm.private_key_name(), private);

            match tokio::fs::read(keys_dir.join(algorithm.public_key_name())).await {
                Ok(public) => {
                    secret.data.insert(algorithm.public_key_name(), public);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(algorithm = %algorithm, "Generator left no public key");
                }
                Err(e) => return Err(e.into()),
            }

            debug!(algorithm = %algorithm, "Generated host key");
        }

        Ok(())
    }

    /// Configured algorithms with no private entry in `secret`
    fn missing_algorithms(&self, secret: &Secret) -> Vec<Algorithm> {
        self.algorithms
            .iter()
            .copied()
            .filter(|algo| !secret.data.contains_key(&algo.private_key_name()))
            .collect()
    }

    /// Add keys for configured algorithms the stored secret lacks
    async fn fill_missing_keys(
        &self,
        mut secret: Secret,
        missing: &[Algorithm],
    ) -> Result<Secret> {
        info!(
            event = "host_keys_filling_missing",
            secret = %secret.name,
            algorithms = ?missing,
            "Generating host keys missing from existing secret"
        );
        self.generate_into(&mut secret, missing).await?;

        self.store
            .update(&secret)
            .await
            .map_err(|e| HostKeyError::store("updating secret", &secret.name, e))
    }

    /// Write every private entry of `secret` into `destination_dir`
    ///
    /// Every entry name is checked before the first file is written.
    async fn materialize(&self, secret: &Secret, destination_dir: &Path) -> Result<Vec<PathBuf>> {
        if let Some(name) = secret.data.keys().find(|name| !is_plain_file_name(name)) {
            return Err(HostKeyError::InvalidEntry(name.clone()));
        }

        tokio::fs::create_dir_all(destination_dir).await?;

        let mut paths = Vec::new();
        for (name, contents) in &secret.data {
            // Public keys are never written to disk
            if name.ends_with(PUBLIC_KEY_SUFFIX) {
                info!(
                    event = "host_key_public_digest",
                    entry = %name,
                    content_sha256 = %hex::encode(Sha256::digest(contents)),
                    "Host public key"
                );
                continue;
            }

            let path = destination_dir.join(name);
            write_private_key(&path, contents).await?;
            paths.push(path);
        }

        info!(
            event = "host_keys_written",
            secret = %secret.name,
            destination = ?destination_dir,
            count = paths.len(),
            "Host keys written"
        );

        Ok(paths)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

async fn write_private_key(path: &Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(PRIVATE_KEY_MODE)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.flush().await?;

    // `mode` only applies to newly created files
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(PRIVATE_KEY_MODE)).await?;

    debug!(path = ?path, "Wrote private key");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("ssh_host_rsa_key"));
        assert!(!is_plain_file_name("/etc/ssh/ssh_host_rsa_key"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }
}
