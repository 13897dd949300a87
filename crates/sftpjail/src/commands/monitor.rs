use anyhow::{Context, Result};
use sftpjail_core::ServiceConfig;
use sftpjail_syslog::{DaemonManager, LogReceiver, MetricsReceiver, Receiver, SessionMetrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Monitor every user's log socket until SIGINT or SIGTERM
///
/// NIST Controls:
/// - AU-12: Audit Generation (per-user log collection)
/// - SI-4: System Monitoring (session metrics)
/// - AU-5: Response to Audit Processing Failures (one failed daemon stops all)
pub async fn run(config: &ServiceConfig) -> Result<()> {
    let metrics = SessionMetrics::new();
    let cancel = CancellationToken::new();

    // Registered before binding so a failure aborts startup
    let signals = ShutdownSignals::register()?;
    let manager = start(config, metrics.clone()).await?;
    if manager.is_empty() {
        warn!(
            event = "monitor_no_users",
            "No users configured, waiting for shutdown"
        );
    }

    let signals = tokio::spawn(signals.cancel_on_signal(cancel.clone()));
    let reporter = (config.monitor.metrics_log_interval_secs > 0).then(|| {
        tokio::spawn(report_metrics(
            metrics.clone(),
            Duration::from_secs(config.monitor.metrics_log_interval_secs),
            cancel.clone(),
        ))
    });

    let result = manager.run(cancel.clone()).await;

    // Stop the helper tasks whichever way the daemons ended
    cancel.cancel();
    if let Err(e) = signals.await {
        warn!(event = "signal_handler_failed", error = %e, "Signal task failed");
    }
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }

    let snapshot = metrics.snapshot();
    info!(
        event = "monitor_stopped",
        current_sessions = snapshot.current_sessions,
        total_sessions = snapshot.total_sessions,
        unmatched_closes = snapshot.unmatched_closes,
        "{}",
        snapshot.summary()
    );

    result.context("Syslog daemon failed")
}

/// Build the receivers and bind every user's socket
async fn start(config: &ServiceConfig, metrics: SessionMetrics) -> Result<DaemonManager> {
    let mut receivers: Vec<Arc<dyn Receiver>> = vec![Arc::new(
        MetricsReceiver::with_default_rules(metrics).context("Failed to build metric rules")?,
    )];
    if config.monitor.log_messages {
        receivers.push(Arc::new(LogReceiver::new(
            std::io::stdout(),
            config.monitor.message_format,
        )));
    }

    info!(
        event = "monitor_starting",
        chroots_dir = ?config.chroots_dir,
        users = config.users.len(),
        receivers = receivers.len(),
        buffer_size = config.monitor.receive_buffer_size,
        "Starting syslog daemons"
    );

    DaemonManager::start(
        &config.chroots_dir,
        &config.users,
        receivers.into(),
        config.monitor.receive_buffer_size,
    )
    .await
    .context("Failed to start syslog daemons")
}

/// SIGTERM and SIGINT handlers, registered before any daemon starts
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    fn register() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .context("Failed to register SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?,
        })
    }

    async fn cancel_on_signal(mut self, cancel: CancellationToken) {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = self.sigterm.recv() => info!(event = "shutdown_signal", signal = "SIGTERM", "Received SIGTERM"),
            _ = self.sigint.recv() => info!(event = "shutdown_signal", signal = "SIGINT", "Received SIGINT"),
        }

        cancel.cancel();
    }
}

async fn report_metrics(metrics: SessionMetrics, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = metrics.snapshot();
                info!(
                    event = "session_metrics",
                    current_sessions = snapshot.current_sessions,
                    total_sessions = snapshot.total_sessions,
                    messages = snapshot.messages_received,
                    "{}",
                    snapshot.summary()
                );
            }
        }
    }
}
