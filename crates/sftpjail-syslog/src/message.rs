//! Syslog datagram decoding
//!
//! NIST 800-53: AU-3 (Content of Audit Records), SI-10 (Information Input Validation)
//! Implementation: Best-effort parser for the BSD syslog lines emitted by the
//! chrooted sshd and internal-sftp processes
//!
//! Grammar accepted:
//!
//! ```text
//! <PRI>[TIMESTAMP ][HOSTNAME ]APPNAME[ ][\[PID\]]:[ ]MESSAGE
//! ```
//!
//! TIMESTAMP is either `Mmm dd hh:mm:ss` (no year, the current one is used)
//! or RFC 3339. Tenant identity is never read from the payload, the caller
//! supplies the user that owns the socket.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sftpjail_core::User;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Highest valid PRI value (facility 23, severity 7)
const MAX_PRIORITY: u16 = 191;

/// Length of a BSD timestamp such as `Feb 23 20:31:22`
const BSD_TIMESTAMP_LEN: usize = 15;

/// Syslog severity, the low three bits of PRI
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// System is unusable
    Emergency,
    /// Action must be taken immediately
    Alert,
    /// Critical conditions
    Critical,
    /// Error conditions
    Error,
    /// Warning conditions
    Warning,
    /// Normal but significant condition
    Notice,
    /// Informational messages
    Informational,
    /// Debug-level messages
    Debug,
}

impl Severity {
    /// Severity encoded in a PRI value
    pub fn from_priority(priority: u8) -> Self {
        match priority & 0x07 {
            0 => Severity::Emergency,
            1 => Severity::Alert,
            2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Informational,
            _ => Severity::Debug,
        }
    }

    /// Conventional short level name, e.g. `info` or `err`
    pub fn short_name(&self) -> &'static str {
        match self {
            Severity::Emergency => "emerg",
            Severity::Alert => "alert",
            Severity::Critical => "crit",
            Severity::Error => "err",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Informational => "info",
            Severity::Debug => "debug",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A decoded log line from a user's chroot
///
/// Built only by [`decode`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// When the line was logged, if the sender included a timestamp
    pub timestamp: Option<DateTime<Utc>>,
    /// Sending host, when present in the header
    pub hostname: Option<String>,
    /// Program name, e.g. `sshd-session` or `internal-sftp`
    pub appname: String,
    /// Process ID from the `[pid]` tag suffix
    pub pid: Option<u32>,
    /// Free-text message body
    pub message: String,
    /// Severity from the PRI field
    pub severity: Severity,
    /// Facility from the PRI field
    pub facility: u8,
    /// User owning the socket the datagram arrived on
    pub user: Arc<User>,
}

impl Message {
    /// Short level name of the message severity
    pub fn level(&self) -> &'static str {
        self.severity.short_name()
    }
}

/// Reasons a datagram does not fit the syslog grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Nothing left after stripping line terminators
    #[error("empty datagram")]
    Empty,

    /// The line does not start with `<PRI>`
    #[error("missing priority")]
    MissingPriority,

    /// PRI is not a number in 0..=191
    #[error("invalid priority {0:?}")]
    InvalidPriority(String),

    /// No `APPNAME:` header before the message body
    #[error("missing tag")]
    MissingTag,

    /// The `[pid]` suffix is not a number
    #[error("invalid pid {0:?}")]
    InvalidPid(String),
}

/// Decode one datagram received on `user`'s socket
///
/// # Errors
///
/// Returns a [`DecodeError`] when the datagram does not fit the grammar.
pub fn decode(data: &[u8], user: &Arc<User>) -> Result<Message, DecodeError> {
    decode_at(data, user, Utc::now())
}

/// Decode with an explicit clock, used to infer the year of BSD timestamps
///
/// # Errors
///
/// Returns a [`DecodeError`] when the datagram does not fit the grammar.
pub fn decode_at(
    data: &[u8],
    user: &Arc<User>,
    now: DateTime<Utc>,
) -> Result<Message, DecodeError> {
    let end = data
        .iter()
        .rposition(|&b| !matches!(b, b'\n' | b'\r' | 0))
        .map_or(0, |i| i + 1);
    if end == 0 {
        return Err(DecodeError::Empty);
    }
    let line = String::from_utf8_lossy(&data[..end]);

    let (priority, rest) = parse_priority(&line)?;
    let (timestamp, rest) = parse_timestamp(rest, now);

    let colon = rest.find(':').ok_or(DecodeError::MissingTag)?;
    let header = rest[..colon].trim();
    let body = &rest[colon + 1..];
    let body = body.strip_prefix(' ').unwrap_or(body);

    let (name_part, pid) = split_pid(header)?;
    let mut tokens = name_part.split_whitespace();
    let (hostname, appname) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(app), None, None) => (None, app),
        (Some(host), Some(app), None) => (Some(host.to_string()), app),
        _ => return Err(DecodeError::MissingTag),
    };
    if appname.contains(['[', ']']) {
        return Err(DecodeError::MissingTag);
    }

    Ok(Message {
        timestamp,
        hostname,
        appname: appname.to_string(),
        pid,
        message: body.to_string(),
        severity: Severity::from_priority(priority),
        facility: priority >> 3,
        user: Arc::clone(user),
    })
}

fn parse_priority(line: &str) -> Result<(u8, &str), DecodeError> {
    let rest = line.strip_prefix('<').ok_or(DecodeError::MissingPriority)?;
    let close = rest.find('>').ok_or(DecodeError::MissingPriority)?;
    let digits = &rest[..close];

    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidPriority(digits.to_string()));
    }
    let priority: u16 = digits
        .parse()
        .map_err(|_| DecodeError::InvalidPriority(digits.to_string()))?;
    let priority = u8::try_from(priority)
        .ok()
        .filter(|p| u16::from(*p) <= MAX_PRIORITY)
        .ok_or_else(|| DecodeError::InvalidPriority(digits.to_string()))?;

    Ok((priority, &rest[close + 1..]))
}

/// Consume a leading timestamp if there is one
///
/// A BSD stamp that names no real date in the current year, such as
/// `Feb 29` outside a leap year, is consumed with no timestamp. Any other
/// unparseable text is left for the header parser.
fn parse_timestamp(rest: &str, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, &str) {
    if let Some(stamp) = rest.get(..BSD_TIMESTAMP_LEN) {
        let followed_by_space = rest[BSD_TIMESTAMP_LEN..].is_empty()
            || rest[BSD_TIMESTAMP_LEN..].starts_with(' ');
        if followed_by_space && is_bsd_timestamp(stamp) {
            let after = rest[BSD_TIMESTAMP_LEN..].trim_start();
            // Days below 10 are space padded
            let stamp = stamp.split_whitespace().collect::<Vec<_>>().join(" ");
            let with_year = format!("{} {stamp}", now.year());
            let parsed = NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc());
            if parsed.is_none() {
                debug!(stamp = %stamp, "Unparseable BSD timestamp");
            }
            return (parsed, after);
        }
    }

    let token_end = rest.find(' ').unwrap_or(rest.len());
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&rest[..token_end]) {
        return (
            Some(parsed.with_timezone(&Utc)),
            rest[token_end..].trim_start(),
        );
    }

    (None, rest)
}

/// `Mmm dd hh:mm:ss` with a space padded or two digit day
fn is_bsd_timestamp(stamp: &str) -> bool {
    let b = stamp.as_bytes();
    b.len() == BSD_TIMESTAMP_LEN
        && b[..3].iter().all(u8::is_ascii_alphabetic)
        && b[3] == b' '
        && (b[4] == b' ' || b[4].is_ascii_digit())
        && b[5].is_ascii_digit()
        && b[6] == b' '
        && b[9] == b':'
        && b[12] == b':'
        && [7, 8, 10, 11, 13, 14].iter().all(|&i| b[i].is_ascii_digit())
}

/// Split `name[pid]` or `name [pid]` into its parts
fn split_pid(header: &str) -> Result<(&str, Option<u32>), DecodeError> {
    let Some(inner) = header.strip_suffix(']') else {
        return Ok((header, None));
    };
    let open = inner.rfind('[').ok_or(DecodeError::MissingTag)?;
    let digits = &inner[open + 1..];
    let pid = digits
        .parse::<u32>()
        .map_err(|_| DecodeError::InvalidPid(digits.to_string()))?;
    Ok((inner[..open].trim_end(), Some(pid)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> Arc<User> {
        Arc::new(User::new("alice"))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_decode_sftp_lines() {
        let cases = [
            (
                "<38>Feb 23 20:31:22 sshd-session[2237381]: Changed root directory to \"/srv/sftp/jail/alice\"\n",
                "sshd-session",
                2_237_381,
                "Changed root directory to \"/srv/sftp/jail/alice\"",
            ),
            (
                "<38>Feb 23 20:31:22 sshd-session [2237381]: Starting session: subsystem 'sftp' for alice from ::1 port 51234 id 0",
                "sshd-session",
                2_237_381,
                "Starting session: subsystem 'sftp' for alice from ::1 port 51234 id 0",
            ),
            (
                "<38>Feb 23 20:31:22 internal-sftp[2237382]: session opened for local user alice from [::1]\n",
                "internal-sftp",
                2_237_382,
                "session opened for local user alice from [::1]",
            ),
            (
                "<38>Feb 23 20:31:22 internal-sftp[2237382]: received client version 3\n",
                "internal-sftp",
                2_237_382,
                "received client version 3",
            ),
            (
                "<38>Feb 23 20:31:22 internal-sftp[2237382]: realpath \".\"\n",
                "internal-sftp",
                2_237_382,
                "realpath \".\"",
            ),
            (
                "<86>Feb 27 11:42:16 sshd-session[732409]: pam_unix(sshd:session): session closed for user bob",
                "sshd-session",
                732_409,
                "pam_unix(sshd:session): session closed for user bob",
            ),
        ];

        let user = alice();
        for (input, app, pid, body) in cases {
            let msg = decode_at(input.as_bytes(), &user, now()).unwrap();
            assert_eq!(msg.appname, app, "{input}");
            assert_eq!(msg.pid, Some(pid), "{input}");
            assert_eq!(msg.message, body, "{input}");
            assert_eq!(msg.level(), "info", "{input}");
            assert_eq!(*msg.user, User::new("alice"));
        }
    }

    #[test]
    fn test_bsd_timestamp_uses_current_year() {
        let msg = decode_at(
            b"<38>Feb 23 20:31:22 internal-sftp[1]: hello",
            &alice(),
            now(),
        )
        .unwrap();
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 2, 23, 20, 31, 22).unwrap())
        );
        assert_eq!(msg.facility, 4);
        assert_eq!(msg.hostname, None);
    }

    #[test]
    fn test_space_padded_day() {
        let msg = decode_at(b"<13>Mar  1 08:00:00 sshd[7]: up", &alice(), now()).unwrap();
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(msg.severity, Severity::Notice);
    }

    #[test]
    fn test_impossible_date_is_dropped() {
        // 2026 is not a leap year
        let msg = decode_at(
            b"<38>Feb 29 20:31:22 internal-sftp[1]: hello",
            &alice(),
            now(),
        )
        .unwrap();
        assert_eq!(msg.timestamp, None);
        assert_eq!(msg.appname, "internal-sftp");
        assert_eq!(msg.pid, Some(1));
        assert_eq!(msg.message, "hello");
    }

    #[test]
    fn test_hostname_and_rfc3339() {
        let msg = decode_at(
            b"<11>2026-02-26T10:04:55+00:00 sftp-0 sshd-session[4106298]: error: fatal",
            &alice(),
            now(),
        )
        .unwrap();
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 2, 26, 10, 4, 55).unwrap())
        );
        assert_eq!(msg.hostname.as_deref(), Some("sftp-0"));
        assert_eq!(msg.appname, "sshd-session");
        assert_eq!(msg.message, "error: fatal");
        assert_eq!(msg.level(), "err");
        assert_eq!(msg.facility, 1);
    }

    #[test]
    fn test_missing_timestamp_and_pid() {
        let msg = decode_at(b"<14>internal-sftp: realpath", &alice(), now()).unwrap();
        assert_eq!(msg.timestamp, None);
        assert_eq!(msg.pid, None);
        assert_eq!(msg.appname, "internal-sftp");
        assert_eq!(msg.message, "realpath");
    }

    #[test]
    fn test_decode_errors() {
        let user = alice();
        let cases: [(&[u8], DecodeError); 7] = [
            (b"\n\0", DecodeError::Empty),
            (b"this is not a syslog message\n", DecodeError::MissingPriority),
            (b"<38 sshd: x", DecodeError::MissingPriority),
            (b"<192>sshd: x", DecodeError::InvalidPriority("192".into())),
            (b"<ab>sshd: x", DecodeError::InvalidPriority("ab".into())),
            (b"<38>Feb 23 20:31:22 no tag here", DecodeError::MissingTag),
            (b"<38>sshd[abc]: x", DecodeError::InvalidPid("abc".into())),
        ];
        for (input, expected) in cases {
            assert_eq!(decode_at(input, &user, now()).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(Severity::from_priority(0).short_name(), "emerg");
        assert_eq!(Severity::from_priority(38).short_name(), "info");
        assert_eq!(Severity::from_priority(191).short_name(), "debug");
        assert_eq!(Severity::from_priority(12).to_string(), "warning");
    }
}
