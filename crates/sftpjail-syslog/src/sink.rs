//! Log sink receiver
//!
//! NIST 800-53: AU-3 (Content of Audit Records), AU-9 (Protection of Audit Information)
//! Implementation: Echo every decoded message, tagged with its tenant, to an
//! output stream for the cluster's log collector

use crate::message::Message;
use crate::receiver::Receiver;
use chrono::SecondsFormat;
use sftpjail_core::LogFormat;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Writes each message as one line to `W`
pub struct LogReceiver<W> {
    out: Mutex<W>,
    format: LogFormat,
}

impl<W: Write + Send> LogReceiver<W> {
    /// Create a sink writing `format` lines to `out`
    pub fn new(out: W, format: LogFormat) -> Self {
        Self {
            out: Mutex::new(out),
            format,
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render one message in the configured format, without a newline
    pub fn format_line(&self, message: &Message) -> String {
        match self.format {
            LogFormat::Text => format_text(message),
            LogFormat::Json => format_json(message),
        }
    }
}

fn format_text(message: &Message) -> String {
    let timestamp = message.timestamp.map_or_else(
        || "-".to_string(),
        |ts| ts.to_rfc3339_opts(SecondsFormat::Secs, false),
    );
    let pid = message
        .pid
        .map_or_else(|| "-".to_string(), |pid| pid.to_string());
    format!(
        "{timestamp} {} {pid} {} {}",
        message.appname, message.user, message.message
    )
}

fn format_json(message: &Message) -> String {
    serde_json::json!({
        "timestamp": message.timestamp,
        "hostname": message.hostname,
        "appname": message.appname,
        "pid": message.pid,
        "level": message.level(),
        "facility": message.facility,
        "user": message.user.username,
        "message": message.message,
    })
    .to_string()
}

impl<W: Write + Send> Receiver for LogReceiver<W> {
    fn receive(&self, message: &Message) {
        let line = self.format_line(message);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(
                event = "log_sink_write_failed",
                user = %message.user,
                error = %e,
                "Failed to write log message"
            );
        }
    }
}
