//! Host key generation via an external tool

use crate::error::{HostKeyError, Result};
use async_trait::async_trait;
use sftpjail_core::Algorithm;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Produces a fresh host key pair on disk
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Generate a key pair for `algorithm`, leaving
    /// `ssh_host_<algo>_key` and `ssh_host_<algo>_key.pub` in `keys_dir`
    async fn generate(&self, algorithm: Algorithm, keys_dir: &Path) -> Result<()>;
}

#[async_trait]
impl<T: KeyGenerator + ?Sized> KeyGenerator for Arc<T> {
    async fn generate(&self, algorithm: Algorithm, keys_dir: &Path) -> Result<()> {
        (**self).generate(algorithm, keys_dir).await
    }
}

/// Key generation with OpenSSH's `ssh-keygen`
#[derive(Debug, Clone)]
pub struct SshKeygen {
    program: PathBuf,
}

impl SshKeygen {
    /// Use the given `ssh-keygen` binary
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::new("ssh-keygen")
    }
}

#[async_trait]
impl KeyGenerator for SshKeygen {
    async fn generate(&self, algorithm: Algorithm, keys_dir: &Path) -> Result<()> {
        let private_key = keys_dir.join(algorithm.private_key_name());

        // ssh-keygen prompts before overwriting, which fails without a tty
        for stale in [private_key.clone(), keys_dir.join(algorithm.public_key_name())] {
            match tokio::fs::remove_file(&stale).await {
                Ok(()) => debug!(path = ?stale, "Removed stale key file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            program = ?self.program,
            algorithm = %algorithm,
            path = ?private_key,
            "Running key generator"
        );

        let output = Command::new(&self.program)
            .arg("-q")
            .args(["-t", algorithm.as_str()])
            .args(["-N", ""])
            .args(["-C", ""])
            .arg("-f")
            .arg(&private_key)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| HostKeyError::Generation {
                algorithm,
                output: format!("failed to run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
            captured.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(HostKeyError::Generation {
                algorithm,
                output: format!("{}: {}", output.status, captured.trim()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn in_path(program: &str) -> bool {
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let keygen = SshKeygen::new("/nonexistent/ssh-keygen");

        let err = keygen.generate(Algorithm::Ed25519, dir.path()).await.unwrap_err();
        match err {
            HostKeyError::Generation { algorithm, output } => {
                assert_eq!(algorithm, Algorithm::Ed25519);
                assert!(output.contains("failed to run"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failing_program() {
        if !in_path("false") {
            eprintln!("Skipping test: 'false' command not found");
            return;
        }
        let dir = TempDir::new().unwrap();
        let keygen = SshKeygen::new("false");

        let err = keygen.generate(Algorithm::Rsa, dir.path()).await.unwrap_err();
        assert!(matches!(err, HostKeyError::Generation { algorithm: Algorithm::Rsa, .. }));
    }

    #[tokio::test]
    async fn test_ssh_keygen_generates_pair() {
        if !in_path("ssh-keygen") {
            eprintln!("Skipping test: 'ssh-keygen' command not found");
            return;
        }
        let dir = TempDir::new().unwrap();
        let keygen = SshKeygen::default();

        // Running twice exercises stale file removal
        for _ in 0..2 {
            keygen.generate(Algorithm::Ed25519, dir.path()).await.unwrap();
        }

        assert!(dir.path().join("ssh_host_ed25519_key").is_file());
        let public = std::fs::read_to_string(dir.path().join("ssh_host_ed25519_key.pub")).unwrap();
        assert!(public.starts_with("ssh-ed25519 "));
    }
}
