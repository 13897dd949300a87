//! Secret store abstraction and a shared-directory backend
//!
//! NIST 800-53: SC-12 (Cryptographic Key Establishment), SC-28 (Protection of Information at Rest)
//! Implementation: Host keys live in a named secret shared by every replica so
//! that all of them present the same SSH identity

use crate::error::SecretStoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A named record mapping file names to raw key bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    /// Secret name
    pub name: String,
    /// File name to file contents
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    /// Create an empty secret
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }
}

/// Read/write contract of the cluster secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret, failing with [`SecretStoreError::NotFound`] if absent
    async fn get(&self, name: &str) -> Result<Secret, SecretStoreError>;

    /// Create a secret, failing with [`SecretStoreError::AlreadyExists`] if
    /// one with the same name exists
    async fn create(&self, secret: &Secret) -> Result<Secret, SecretStoreError>;

    /// Replace the contents of an existing secret
    async fn update(&self, secret: &Secret) -> Result<Secret, SecretStoreError>;
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    async fn get(&self, name: &str) -> Result<Secret, SecretStoreError> {
        (**self).get(name).await
    }

    async fn create(&self, secret: &Secret) -> Result<Secret, SecretStoreError> {
        (**self).create(secret).await
    }

    async fn update(&self, secret: &Secret) -> Result<Secret, SecretStoreError> {
        (**self).update(secret).await
    }
}

/// On-disk representation of a secret
#[derive(Debug, Serialize, Deserialize)]
struct SecretDocument {
    name: String,
    data: BTreeMap<String, String>,
}

impl SecretDocument {
    fn encode(secret: &Secret) -> Self {
        Self {
            name: secret.name.clone(),
            data: secret
                .data
                .iter()
                .map(|(file, bytes)| (file.clone(), hex::encode(bytes)))
                .collect(),
        }
    }

    fn decode(self) -> Result<Secret, SecretStoreError> {
        let data = self
            .data
            .into_iter()
            .map(|(file, encoded)| Ok((file, hex::decode(encoded)?)))
            .collect::<Result<_, SecretStoreError>>()?;
        Ok(Secret {
            name: self.name,
            data,
        })
    }
}

/// Secret store backed by a directory shared between replicas
///
/// Each secret is one JSON document, `<dir>/<name>.json`, readable by the
/// owner only. Creation is atomic create-if-absent: the document is written
/// to a temporary file and hard-linked into place, so two replicas racing on
/// first boot see exactly one winner.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the secret documents
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, name: &str) -> Result<PathBuf, SecretStoreError> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
            return Err(SecretStoreError::Backend(format!(
                "invalid secret name {name:?}"
            )));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Write `secret` to a fresh temporary file next to its final location
    async fn write_temp(&self, secret: &Secret) -> Result<PathBuf, SecretStoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tmp = self
            .dir
            .join(format!(".{}.{}.{nanos}.tmp", secret.name, std::process::id()));

        let contents = serde_json::to_vec_pretty(&SecretDocument::encode(secret))?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&tmp)
            .await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;

        Ok(tmp)
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, name: &str) -> Result<Secret, SecretStoreError> {
        let path = self.document_path(name)?;
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretStoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let document: SecretDocument = serde_json::from_slice(&contents)?;
        debug!(secret = name, path = ?path, "Read secret");
        document.decode()
    }

    async fn create(&self, secret: &Secret) -> Result<Secret, SecretStoreError> {
        let path = self.document_path(&secret.name)?;
        let tmp = self.write_temp(secret).await?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => {
                debug!(secret = %secret.name, path = ?path, "Created secret");
                Ok(secret.clone())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(SecretStoreError::AlreadyExists(secret.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, secret: &Secret) -> Result<Secret, SecretStoreError> {
        let path = self.document_path(&secret.name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(SecretStoreError::NotFound(secret.name.clone()));
        }

        let tmp = self.write_temp(secret).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(secret = %secret.name, path = ?path, "Updated secret");
        Ok(secret.clone())
    }
}
