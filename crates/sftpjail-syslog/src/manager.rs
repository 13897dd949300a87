//! Runs one syslog daemon per configured user
//!
//! NIST 800-53: AU-5 (Response to Audit Processing Failures)
//! Implementation: All daemons share one cancellation scope. The first
//! failure cancels the scope so no user is left unmonitored while others run.

use crate::daemon::SyslogDaemon;
use crate::error::{Result, SyslogError};
use crate::receiver::SharedReceivers;
use sftpjail_core::User;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Owns the full set of bound daemons
#[derive(Debug)]
pub struct DaemonManager {
    daemons: Vec<SyslogDaemon>,
}

impl DaemonManager {
    /// Bind a daemon for every user
    ///
    /// All sockets are bound before any daemon runs. A single failure aborts
    /// startup and drops the sockets already bound.
    ///
    /// # Errors
    ///
    /// Returns the first bind error.
    pub async fn start(
        chroots_dir: &Path,
        users: &[User],
        receivers: SharedReceivers,
        buffer_size: usize,
    ) -> Result<Self> {
        let mut daemons = Vec::with_capacity(users.len());
        for user in users {
            let daemon = SyslogDaemon::bind(
                chroots_dir,
                Arc::new(user.clone()),
                Arc::clone(&receivers),
                buffer_size,
            )
            .await?;
            daemons.push(daemon);
        }

        info!(
            event = "syslog_daemons_bound",
            users = daemons.len(),
            chroots_dir = ?chroots_dir,
            "Monitoring {} users",
            daemons.len()
        );

        Ok(Self { daemons })
    }

    /// Number of bound daemons
    pub fn len(&self) -> usize {
        self.daemons.len()
    }

    /// Whether no users are configured
    pub fn is_empty(&self) -> bool {
        self.daemons.is_empty()
    }

    /// Run every daemon until `cancel` fires or one of them fails
    ///
    /// See [`supervise`] for the failure semantics.
    ///
    /// # Errors
    ///
    /// Returns the first daemon error. External cancellation is not an error.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let tasks = self
            .daemons
            .into_iter()
            .map(|daemon| move |scope: CancellationToken| daemon.connect(scope));
        supervise(tasks, cancel).await
    }
}

/// Run a group of tasks under a child of `cancel`
///
/// Each task is started with the shared child token. When any task fails,
/// or panics, the child scope is cancelled and the remaining tasks are
/// drained before this returns. With no tasks it waits for `cancel`.
///
/// # Errors
///
/// Returns the first task error. Panics surface as [`SyslogError::Task`].
pub async fn supervise<I, F, Fut>(tasks: I, cancel: CancellationToken) -> Result<()>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let scope = cancel.child_token();

    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(task(scope.clone()));
    }

    if set.is_empty() {
        scope.cancelled().await;
        return Ok(());
    }

    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        let Err(e) = joined.map_err(SyslogError::from).and_then(|result| result) else {
            continue;
        };

        if first_error.is_none() {
            error!(
                event = "syslog_daemon_failed",
                error = %e,
                "Log daemon failed, stopping all daemons"
            );
            scope.cancel();
            first_error = Some(e);
        } else {
            debug!(error = %e, "Additional daemon error during shutdown");
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}