//! Configuration parsing tests

use sftpjail_core::{Algorithm, LogFormat, ServiceConfig};
use std::path::{Path, PathBuf};

const FULL_CONFIG: &str = r#"
chroots_dir = "/srv/sftp/jail"

[host_keys]
secret_name = "host-keys"
algorithms = ["ed25519"]
destination_dir = "/run/sshd/keys"
fill_missing = true

[secret_store]
dir = "/mnt/secrets"

[monitor]
receive_buffer_size = 2048
log_messages = false
message_format = "json"
metrics_log_interval_secs = 0

[logging]
level = "debug"
format = "json"
file = "/var/log/sftpjail/sftpjail.log"

[[users]]
username = "alice"
authorized_keys = ["ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAlice alice@example.com"]

[[users]]
username = "bob"
authorized_keys = [
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBob1 bob@example.com",
    "ssh-rsa AAAAB3NzaC1yc2EAAAABob2 bob@work.com",
]
allowed_hosts = ["10.0.0.0/8"]
"#;

#[test]
fn test_full_config() {
    let config = ServiceConfig::from_toml(FULL_CONFIG).unwrap();
    config.validate().unwrap();

    assert_eq!(config.chroots_dir, PathBuf::from("/srv/sftp/jail"));
    assert_eq!(config.host_keys.secret_name, "host-keys");
    assert_eq!(config.host_keys.algorithms, vec![Algorithm::Ed25519]);
    assert!(config.host_keys.fill_missing);
    // Unset keys keep their defaults
    assert_eq!(config.host_keys.keygen_program, PathBuf::from("ssh-keygen"));
    assert_eq!(config.secret_store.dir, PathBuf::from("/mnt/secrets"));
    assert_eq!(config.monitor.receive_buffer_size, 2048);
    assert_eq!(config.monitor.message_format, LogFormat::Json);
    assert_eq!(config.logging.format, LogFormat::Json);

    assert_eq!(config.users.len(), 2);
    let bob = &config.users[1];
    assert_eq!(bob.username, "bob");
    assert_eq!(bob.authorized_keys.len(), 2);
    assert_eq!(bob.allowed_hosts, vec!["10.0.0.0/8".to_string()]);
    assert_eq!(
        bob.dev_log_path(&config.chroots_dir),
        Path::new("/srv/sftp/jail/bob/dev/log")
    );
}

#[test]
fn test_unknown_algorithm_rejected() {
    let err = ServiceConfig::from_toml(
        r#"
        [host_keys]
        algorithms = ["dsa"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_unsafe_username_rejected() {
    let config = ServiceConfig::from_toml(
        r#"
        [[users]]
        username = "../etc"
        "#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_buffer_rejected() {
    let config = ServiceConfig::from_toml(
        r#"
        [monitor]
        receive_buffer_size = 0
        "#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}
