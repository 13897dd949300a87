//! Session metrics derived from sshd log lines
//!
//! NIST 800-53: AU-2 (Audit Events), SI-4 (System Monitoring), AC-10 (Concurrent Session Control)
//! Implementation: Pattern rules turn decoded messages into a session gauge
//! and counter shared by every daemon

use crate::error::Result;
use crate::message::Message;
use crate::receiver::Receiver;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Process-wide session counters
///
/// NIST 800-53: SI-4 (System Monitoring)
/// Implementation: Thread-safe counters using atomic operations
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    inner: Arc<SessionMetricsInner>,
}

#[derive(Debug)]
struct SessionMetricsInner {
    current_sessions: AtomicI64,
    total_sessions: AtomicU64,
    unmatched_closes: AtomicU64,
    messages_received: AtomicU64,
    start_time: DateTime<Utc>,
}

/// Snapshot of the session counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetricsSnapshot {
    /// Timestamp of snapshot
    pub timestamp: DateTime<Utc>,
    /// Seconds since the metrics were created
    pub uptime_seconds: i64,
    /// Sessions currently open, negative while closes run ahead of starts
    pub current_sessions: i64,
    /// Sessions opened since start
    pub total_sessions: u64,
    /// Close events that drove the gauge below zero
    pub unmatched_closes: u64,
    /// Messages evaluated against the rules
    pub messages_received: u64,
}

impl SessionMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionMetricsInner {
                current_sessions: AtomicI64::new(0),
                total_sessions: AtomicU64::new(0),
                unmatched_closes: AtomicU64::new(0),
                messages_received: AtomicU64::new(0),
                start_time: Utc::now(),
            }),
        }
    }

    /// Record a session start
    pub fn record_session_start(&self) {
        self.inner.current_sessions.fetch_add(1, Ordering::Relaxed);
        self.inner.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session close
    ///
    /// The gauge may go negative when a close is seen before its start; the
    /// later start brings it back. Returns `false`, and counts an unmatched
    /// close, when this close drove the gauge below zero.
    pub fn record_session_close(&self) -> bool {
        let previous = self.inner.current_sessions.fetch_sub(1, Ordering::Relaxed);
        if previous <= 0 {
            self.inner.unmatched_closes.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Record a message evaluated by the metrics receiver
    pub fn record_message(&self) {
        self.inner.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Sessions currently open
    pub fn current_sessions(&self) -> i64 {
        self.inner.current_sessions.load(Ordering::Relaxed)
    }

    /// Sessions opened since start
    pub fn total_sessions(&self) -> u64 {
        self.inner.total_sessions.load(Ordering::Relaxed)
    }

    /// Get a snapshot of the counters
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        let now = Utc::now();
        SessionMetricsSnapshot {
            timestamp: now,
            uptime_seconds: now.signed_duration_since(self.inner.start_time).num_seconds(),
            current_sessions: self.current_sessions(),
            total_sessions: self.total_sessions(),
            unmatched_closes: self.inner.unmatched_closes.load(Ordering::Relaxed),
            messages_received: self.inner.messages_received.load(Ordering::Relaxed),
        }
    }

    /// Export metrics as compact JSON (single line)
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetricsSnapshot {
    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Sessions (uptime: {}s): {} current, {} total, {} unmatched closes, {} messages",
            self.uptime_seconds,
            self.current_sessions,
            self.total_sessions,
            self.unmatched_closes,
            self.messages_received
        )
    }
}

/// Action fired when a rule matches
pub type MetricAction = fn(&SessionMetrics, &Message);

/// A pattern matched against the message body and the action it fires
#[derive(Debug, Clone)]
pub struct MetricRule {
    name: &'static str,
    pattern: Regex,
    action: MetricAction,
}

impl MetricRule {
    /// Compile a rule
    ///
    /// # Errors
    ///
    /// Returns [`SyslogError::Pattern`](crate::SyslogError::Pattern) if the
    /// pattern is not a valid regex.
    pub fn new(name: &'static str, pattern: &str, action: MetricAction) -> Result<Self> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            action,
        })
    }

    /// Rule name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn session_started(metrics: &SessionMetrics, _message: &Message) {
    metrics.record_session_start();
}

fn session_closed(metrics: &SessionMetrics, message: &Message) {
    if !metrics.record_session_close() {
        warn!(
            event = "session_close_unmatched",
            user = %message.user,
            pid = ?message.pid,
            "Session close without a matching start, gauge below zero"
        );
    }
}

/// Receiver that updates [`SessionMetrics`] from sshd session lines
///
/// Every rule is evaluated for every message; more than one may fire.
#[derive(Debug, Clone)]
pub struct MetricsReceiver {
    metrics: SessionMetrics,
    rules: Vec<MetricRule>,
}

impl MetricsReceiver {
    /// Create a receiver with an explicit rule list
    pub fn new(metrics: SessionMetrics, rules: Vec<MetricRule>) -> Self {
        Self { metrics, rules }
    }

    /// Create a receiver with the sshd session rules
    ///
    /// - `^Starting session:` opens a session
    /// - `^Close session:` closes one
    ///
    /// # Errors
    ///
    /// Returns an error if a rule pattern fails to compile.
    pub fn with_default_rules(metrics: SessionMetrics) -> Result<Self> {
        let rules = vec![
            MetricRule::new("session_start", r"^Starting session:", session_started)?,
            MetricRule::new("session_close", r"^Close session:", session_closed)?,
        ];
        Ok(Self::new(metrics, rules))
    }

    /// Counters updated by this receiver
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }
}

impl Receiver for MetricsReceiver {
    fn receive(&self, message: &Message) {
        self.metrics.record_message();
        for rule in &self.rules {
            if rule.pattern.is_match(&message.message) {
                debug!(rule = rule.name, user = %message.user, "Metric rule matched");
                (rule.action)(&self.metrics, message);
            }
        }
    }
}
