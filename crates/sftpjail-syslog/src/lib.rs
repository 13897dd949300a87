//! # sftpjail syslog
//!
//! Per-tenant log aggregation for chrooted SFTP users.
//!
//! Each user gets a [`SyslogDaemon`] listening on `<chroot>/dev/log`. Lines
//! logged by the chrooted sshd are decoded into [`Message`] values and handed
//! to every registered [`Receiver`]: [`MetricsReceiver`] keeps session
//! counters and [`LogReceiver`] echoes the lines to an output stream.
//! [`DaemonManager`] runs all daemons under one cancellation scope.

pub mod daemon;
pub mod error;
pub mod manager;
pub mod message;
pub mod metrics;
pub mod receiver;
pub mod sink;

pub use daemon::SyslogDaemon;
pub use error::{Result, SyslogError};
pub use manager::{DaemonManager, supervise};
pub use message::{DecodeError, Message, Severity, decode};
pub use metrics::{MetricRule, MetricsReceiver, SessionMetrics, SessionMetricsSnapshot};
pub use receiver::{Receiver, SharedReceivers};
pub use sink::LogReceiver;
