//! Error types for host key provisioning
//!
//! NIST 800-53: SI-11 (Error Handling), SC-12 (Cryptographic Key Establishment)
//! Implementation: Store and generation failures carry enough context to
//! diagnose a failed provisioning run without exposing key material

use sftpjail_core::Algorithm;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, HostKeyError>;

/// Errors reported by a [`SecretStore`](crate::SecretStore) backend
#[derive(Error, Debug)]
pub enum SecretStoreError {
    /// No secret with this name exists
    #[error("secret {0} not found")]
    NotFound(String),

    /// A secret with this name was created concurrently
    #[error("secret {0} already exists")]
    AlreadyExists(String),

    /// Backend failure (connection, permissions, corruption)
    #[error("secret store backend error: {0}")]
    Backend(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized
    #[error("malformed secret document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored key bytes were not valid hex
    #[error("malformed secret entry: {0}")]
    Encoding(#[from] hex::FromHexError),
}

impl SecretStoreError {
    /// Whether the store reported that the secret is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretStoreError::NotFound(_))
    }

    /// Whether the store rejected a create because the secret exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, SecretStoreError::AlreadyExists(_))
    }
}

/// Host key provisioning errors
///
/// NIST 800-53: SI-11 (Error Handling)
#[derive(Error, Debug)]
pub enum HostKeyError {
    /// Secret store failure other than "not found"
    ///
    /// `context` is one of "getting secret", "creating secret" or
    /// "updating secret".
    #[error("{context} {name}: {source}")]
    Store {
        /// Operation that failed
        context: &'static str,
        /// Secret name
        name: String,
        /// Underlying store error
        #[source]
        source: SecretStoreError,
    },

    /// The key generation tool failed
    ///
    /// NIST 800-53: SC-12 (Cryptographic Key Establishment)
    #[error("generating {algorithm} host key failed: {output}")]
    Generation {
        /// Algorithm being generated
        algorithm: Algorithm,
        /// Exit status and captured tool output
        output: String,
    },

    /// The generation tool exited cleanly but left no key behind
    #[error("expected key file {} was not generated", .0.display())]
    MissingKeyFile(PathBuf),

    /// A stored entry name is not a plain file name
    ///
    /// NIST 800-53: SI-10 (Input Validation)
    #[error("secret entry {0:?} is not a valid key file name")]
    InvalidEntry(String),

    /// The stored secret has no key for some configured algorithms and
    /// filling missing keys is disabled
    #[error("secret {name} has no host key for {algorithms:?}")]
    MissingAlgorithms {
        /// Secret name
        name: String,
        /// Configured algorithms without a private entry
        algorithms: Vec<Algorithm>,
    },

    /// The secret was created but could not be read back
    #[error("secret {0} is missing after it was created")]
    SecretVanished(String),

    /// I/O error while writing keys
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostKeyError {
    pub(crate) fn store(context: &'static str, name: &str, source: SecretStoreError) -> Self {
        HostKeyError::Store {
            context,
            name: name.to_string(),
            source,
        }
    }
}
