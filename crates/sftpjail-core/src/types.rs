use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix carried by every public host key file
pub const PUBLIC_KEY_SUFFIX: &str = ".pub";

/// SSH host key algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Ed25519,
    Ecdsa,
    Rsa,
}

impl Algorithm {
    /// Every supported algorithm, in preference order
    pub const ALL: [Algorithm; 3] = [Algorithm::Ed25519, Algorithm::Ecdsa, Algorithm::Rsa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Ecdsa => "ecdsa",
            Algorithm::Rsa => "rsa",
        }
    }

    /// File name of the private key, e.g. `ssh_host_ed25519_key`
    pub fn private_key_name(&self) -> String {
        format!("ssh_host_{}_key", self.as_str())
    }

    /// File name of the public key, e.g. `ssh_host_ed25519_key.pub`
    pub fn public_key_name(&self) -> String {
        format!("{}{}", self.private_key_name(), PUBLIC_KEY_SUFFIX)
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ed25519" => Ok(Algorithm::Ed25519),
            "ecdsa" => Ok(Algorithm::Ecdsa),
            "rsa" => Ok(Algorithm::Rsa),
            other => Err(CoreError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Parse a comma separated algorithm list such as `ed25519,rsa`
pub fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, CoreError> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// An SFTP user confined to their own chroot
///
/// All paths are derived from the username and the chroots parent directory,
/// so a `User` carries no paths of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub authorized_keys: Vec<String>,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authorized_keys: Vec::new(),
            allowed_hosts: Vec::new(),
        }
    }

    /// Home directory as seen from inside the chroot
    pub fn home_dir(&self) -> PathBuf {
        Path::new("/home").join(&self.username)
    }

    /// Host path of the user's chroot
    pub fn chroot_dir(&self, chroots_dir: &Path) -> PathBuf {
        chroots_dir.join(&self.username)
    }

    /// Host path of the user's home directory inside their chroot
    pub fn chroot_home_dir(&self, chroots_dir: &Path) -> PathBuf {
        self.chroot_dir(chroots_dir).join("home").join(&self.username)
    }

    /// Host path of the log socket the chrooted sshd writes to
    pub fn dev_log_path(&self, chroots_dir: &Path) -> PathBuf {
        self.chroot_dir(chroots_dir).join("dev").join("log")
    }

    /// Usernames become path components, so reject anything that could
    /// escape the chroots directory.
    pub fn validate(&self) -> Result<(), CoreError> {
        let name = self.username.as_str();
        if name.is_empty() {
            return Err(CoreError::InvalidConfig("username must not be empty".into()));
        }
        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(CoreError::InvalidConfig(format!(
                "username {name:?} is not a valid path component"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}
