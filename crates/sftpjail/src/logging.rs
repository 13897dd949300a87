//! Tracing subscriber setup
//!
//! NIST 800-53: AU-9 (Protection of Audit Information), AU-12 (Audit Generation)
//! STIG: V-222648 (Audit Records)
//! Implementation: Text or JSON logs to stderr, or to a daily rolling file
//! through a non-blocking writer

use anyhow::{Context, Result, anyhow};
use sftpjail_core::{LogFormat, LoggingConfig};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be held
/// until the process exits.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level {:?}", config.level))?;

    let Some(log_file) = &config.file else {
        match config.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
        }
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;
        return Ok(None);
    };

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file
        .file_name()
        .context("logging.file must include a file name")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .try_init(),
    }
    .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    Ok(Some(guard))
}
