//! sftpjail command line
//!
//! NIST 800-53: CM-6 (Configuration Settings), AU-12 (Audit Generation)
//! Implementation: `provision` runs once before sshd starts; `monitor` runs
//! alongside it for the lifetime of the container

mod commands;
mod config;
mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sftpjail_core::{LogFormat, ServiceConfig, parse_algorithms};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sftpjail")]
#[command(about = "Host key provisioning and per-user log monitoring for chrooted SFTP", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        env = "SFTPJAIL_CONFIG",
        default_value = "/etc/sftpjail/config.toml"
    )]
    config: PathBuf,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch or generate the SSH host keys and write them to disk
    Provision {
        /// Name of the secret holding the host keys
        #[arg(long, env = "HOST_KEYS_SECRET")]
        host_keys_secret: Option<String>,

        /// Comma separated key algorithms, e.g. `ed25519,rsa`
        #[arg(long, env = "HOST_KEYS_ALGORITHMS")]
        algorithms: Option<String>,

        /// Directory the private keys are written to
        #[arg(long)]
        destination_dir: Option<PathBuf>,
    },

    /// Listen on every user's log socket until interrupted
    Monitor,

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::InitConfig { force } => commands::config::init(&cli.config, *force).await,
        Commands::CheckConfig => commands::config::check(&cli.config).await,
        Commands::Provision { .. } | Commands::Monitor => {
            let (mut config, loaded) = config::load_or_default(&cli.config).await?;
            apply_overrides(&mut config, &cli)?;
            config.validate().context("Invalid configuration")?;

            let _log_guard = logging::init(&config.logging)?;
            if !loaded {
                tracing::warn!(
                    event = "config_defaults",
                    path = ?cli.config,
                    "Configuration file not found, using defaults"
                );
            }

            if matches!(cli.command, Commands::Monitor) {
                commands::monitor::run(&config).await
            } else {
                commands::provision::run(&config).await
            }
        }
    }
}

/// Layer command line flags and environment variables over the file config
fn apply_overrides(config: &mut ServiceConfig, cli: &Cli) -> anyhow::Result<()> {
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }

    if let Commands::Provision {
        host_keys_secret,
        algorithms,
        destination_dir,
    } = &cli.command
    {
        if let Some(name) = host_keys_secret {
            config.host_keys.secret_name.clone_from(name);
        }
        if let Some(list) = algorithms {
            config.host_keys.algorithms =
                parse_algorithms(list).context("Invalid host key algorithm list")?;
        }
        if let Some(dir) = destination_dir {
            config.host_keys.destination_dir.clone_from(dir);
        }
    }

    Ok(())
}
