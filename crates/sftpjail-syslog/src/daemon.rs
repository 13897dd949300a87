//! Per-user syslog daemon
//!
//! NIST 800-53: AU-12 (Audit Generation), AC-6 (Least Privilege)
//! Implementation: One Unix datagram socket per chroot at `<chroot>/dev/log`.
//! The socket is world-writable so the unprivileged sftp process can log,
//! and the owning user is inferred from which socket a line arrives on.

use crate::error::{Result, SyslogError};
use crate::message;
use crate::receiver::SharedReceivers;
use sftpjail_core::User;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixDatagram;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Mode of the log socket
const SOCKET_MODE: u32 = 0o666;

/// Reads one user's log socket and fans decoded messages out to receivers
pub struct SyslogDaemon {
    user: Arc<User>,
    path: PathBuf,
    socket: UnixDatagram,
    receivers: SharedReceivers,
    buffer_size: usize,
}

impl SyslogDaemon {
    /// Bind `user`'s log socket under `chroots_dir`
    ///
    /// Creates `<chroot>/dev` if needed and removes a stale socket left by a
    /// previous run before binding.
    ///
    /// # Errors
    ///
    /// Returns [`SyslogError::Bind`] if the socket cannot be created and
    /// [`SyslogError::Permissions`] if it cannot be made world-writable.
    pub async fn bind(
        chroots_dir: &Path,
        user: Arc<User>,
        receivers: SharedReceivers,
        buffer_size: usize,
    ) -> Result<Self> {
        let path = user.dev_log_path(chroots_dir);
        let bind_error = |source| SyslogError::Bind {
            path: path.clone(),
            source,
        };

        if let Some(dev_dir) = path.parent() {
            tokio::fs::create_dir_all(dev_dir).await.map_err(bind_error)?;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = ?path, "Removed stale log socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(bind_error(e)),
        }

        let socket = UnixDatagram::bind(&path).map_err(bind_error)?;

        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(SOCKET_MODE))
            .await
            .map_err(|source| SyslogError::Permissions {
                path: path.clone(),
                source,
            })?;

        debug!(user = %user, path = ?path, "Bound log socket");

        Ok(Self {
            user,
            path,
            socket,
            receivers,
            buffer_size: buffer_size.max(1),
        })
    }

    /// User this daemon listens for
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Path of the bound socket
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode one datagram and hand it to every receiver in order
    ///
    /// Malformed datagrams are logged and dropped.
    pub fn process(&self, data: &[u8]) {
        match message::decode(data, &self.user) {
            Ok(message) => {
                for receiver in self.receivers.iter() {
                    receiver.receive(&message);
                }
            }
            Err(e) => warn!(
                event = "syslog_decode_failed",
                user = %self.user,
                error = %e,
                raw = %String::from_utf8_lossy(data),
                "Failed to decode syslog message"
            ),
        }
    }

    /// Read datagrams until `cancel` fires
    ///
    /// Consumes the daemon, so the socket is closed when this returns,
    /// whether through cancellation or an error. The socket file is left in
    /// place and removed by the next [`bind`](Self::bind).
    ///
    /// # Errors
    ///
    /// Returns [`SyslogError::Read`] if reading from the socket fails.
    pub async fn connect(self, cancel: CancellationToken) -> Result<()> {
        let mut buf = vec![0u8; self.buffer_size];

        info!(
            event = "syslog_daemon_started",
            user = %self.user,
            path = ?self.path,
            "Listening for log messages"
        );

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!(
                        event = "syslog_daemon_stopped",
                        user = %self.user,
                        "Log daemon stopped"
                    );
                    return Ok(());
                }
                received = self.socket.recv(&mut buf) => match received {
                    Ok(len) => self.process(&buf[..len]),
                    Err(source) => {
                        return Err(SyslogError::Read {
                            user: self.user.username.clone(),
                            source,
                        });
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for SyslogDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyslogDaemon")
            .field("user", &self.user.username)
            .field("path", &self.path)
            .field("receivers", &self.receivers.len())
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}
