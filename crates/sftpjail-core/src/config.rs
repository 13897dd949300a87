//! Service configuration shared by provisioning and monitoring

use crate::error::{CoreError, Result};
use crate::types::{Algorithm, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Top level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Parent directory holding one chroot per user
    #[serde(default = "default_chroots_dir")]
    pub chroots_dir: PathBuf,

    #[serde(default)]
    pub host_keys: HostKeysConfig,

    #[serde(default)]
    pub secret_store: SecretStoreConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub users: Vec<User>,
}

/// Host key provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostKeysConfig {
    /// Name of the secret holding the host keys
    pub secret_name: String,
    /// Algorithms to generate when the secret does not exist yet
    pub algorithms: Vec<Algorithm>,
    /// Directory the private keys are written to
    pub destination_dir: PathBuf,
    /// Scratch prefix for freshly generated keys (`<work_dir>/etc/ssh`)
    pub work_dir: PathBuf,
    /// Key generation program
    pub keygen_program: PathBuf,
    /// Generate and store keys for configured algorithms missing from an
    /// existing secret
    pub fill_missing: bool,
}

impl Default for HostKeysConfig {
    fn default() -> Self {
        Self {
            secret_name: "sftpjail-host-keys".to_string(),
            algorithms: Algorithm::ALL.to_vec(),
            destination_dir: PathBuf::from("/etc/ssh"),
            work_dir: PathBuf::from("/var/lib/sftpjail/keygen"),
            keygen_program: PathBuf::from("ssh-keygen"),
            fill_missing: false,
        }
    }
}

/// Secret store backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretStoreConfig {
    /// Shared directory holding one JSON document per secret
    pub dir: PathBuf,
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/lib/sftpjail/secrets"),
        }
    }
}

/// Log aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum datagram size read from a user's log socket
    pub receive_buffer_size: usize,
    /// Echo every decoded message to stdout
    pub log_messages: bool,
    /// Line format used when echoing messages
    pub message_format: LogFormat,
    /// Interval between session metric summaries, 0 disables them
    pub metrics_log_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: 1024,
            log_messages: true,
            message_format: LogFormat::Text,
            metrics_log_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,
    /// Log format (text or json)
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Output format for logs and echoed messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text for human readability
    Text,
    /// One JSON object per line for log aggregators
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(CoreError::UnknownLogFormat(other.to_string())),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            chroots_dir: default_chroots_dir(),
            host_keys: HostKeysConfig::default(),
            secret_store: SecretStoreConfig::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
            users: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::Parse(format!("Failed to parse config: {e}")))
    }

    /// Render configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CoreError::Parse(format!("Failed to serialize config: {e}")))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host_keys.secret_name.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "host_keys.secret_name must not be empty".to_string(),
            ));
        }

        if self.host_keys.algorithms.is_empty() {
            return Err(CoreError::InvalidConfig(
                "host_keys.algorithms must list at least one algorithm".to_string(),
            ));
        }

        let mut algorithms = HashSet::new();
        for algo in &self.host_keys.algorithms {
            if !algorithms.insert(algo) {
                return Err(CoreError::InvalidConfig(format!(
                    "host key algorithm {algo} listed more than once"
                )));
            }
        }

        if self.monitor.receive_buffer_size == 0 {
            return Err(CoreError::InvalidConfig(
                "monitor.receive_buffer_size must be greater than zero".to_string(),
            ));
        }

        let mut usernames = HashSet::new();
        for user in &self.users {
            user.validate()?;
            if !usernames.insert(user.username.as_str()) {
                return Err(CoreError::InvalidConfig(format!(
                    "user {} is configured more than once",
                    user.username
                )));
            }
        }

        Ok(())
    }
}

fn default_chroots_dir() -> PathBuf {
    PathBuf::from("/chroots")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.chroots_dir, PathBuf::from("/chroots"));
        assert_eq!(config.host_keys.algorithms, Algorithm::ALL.to_vec());
        assert_eq!(config.monitor.receive_buffer_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_toml() {
        let config = ServiceConfig::from_toml(
            r#"
            [[users]]
            username = "bob"
            "#,
        )
        .unwrap();

        assert_eq!(config.users, vec![User::new("bob")]);
        assert_eq!(config.host_keys.secret_name, "sftpjail-host-keys");
    }

    #[test]
    fn test_roundtrip_default() {
        let rendered = ServiceConfig::default().to_toml().unwrap();
        let parsed = ServiceConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.host_keys.algorithms, Algorithm::ALL.to_vec());
    }

    #[test]
    fn test_duplicate_users_rejected() {
        let mut config = ServiceConfig::default();
        config.users = vec![User::new("alice"), User::new("alice")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_algorithms_rejected() {
        let mut config = ServiceConfig::default();
        config.host_keys.algorithms.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
