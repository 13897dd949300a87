//! Error types for the log aggregation pipeline
//!
//! NIST 800-53: SI-11 (Error Handling), AU-5 (Response to Audit Processing Failures)
//! Implementation: Bind and read failures are fatal and stop all daemons,
//! so observability never silently degrades

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for syslog daemon operations
pub type Result<T> = std::result::Result<T, SyslogError>;

/// Syslog daemon errors
#[derive(Error, Debug)]
pub enum SyslogError {
    /// The user's log socket could not be created
    #[error("failed to bind log socket {path}: {source}")]
    Bind {
        /// Socket path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The socket could not be made writable for the chrooted process
    #[error("failed to set permissions on log socket {path}: {source}")]
    Permissions {
        /// Socket path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading from a user's socket failed
    #[error("failed to read log socket for user {user}: {source}")]
    Read {
        /// Owning user
        user: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A metric rule pattern did not compile
    #[error("invalid metric rule pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A daemon task panicked or was aborted
    #[error("syslog daemon task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
