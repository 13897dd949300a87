//! # sftpjail host keys
//!
//! Idempotent provisioning of the SSH server's host identity.
//!
//! On first start the host keys are generated with `ssh-keygen` and stored
//! in a named secret shared by every replica. Every start, including the
//! first, then writes the stored private keys to disk, so all replicas and
//! restarts present the same identity.

pub mod error;
pub mod keygen;
pub mod provisioner;
pub mod store;

pub use error::{HostKeyError, Result, SecretStoreError};
pub use keygen::{KeyGenerator, SshKeygen};
pub use provisioner::HostKeyProvisioner;
pub use store::{FileSecretStore, Secret, SecretStore};
