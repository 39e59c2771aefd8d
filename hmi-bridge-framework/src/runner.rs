//! Bridge process lifecycle: startup, workers, shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use hmi_common::{Format, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::status::{BridgeState, StatusPublisher};

/// How long workers get to wind down after the shutdown signal before being aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(6);

struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

/// Owns the Zenoh session and the bridge's worker tasks.
///
/// Startup installs logging and opens the session; any failure there is
/// returned to `main` and is fatal. After that the runner waits for Ctrl+C or
/// SIGTERM, flips the shared shutdown signal and gives every worker
/// [`SHUTDOWN_GRACE`] to return.
pub struct BridgeRunner<C: BridgeConfig> {
    name: String,
    version: String,
    config: C,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status: Option<StatusPublisher>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<Worker>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Start the bridge, letting `--log-level` override the configured level.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_level = args.and_then(|a| a.log_level.as_deref());
        init_tracing(&config.logging().with_level_override(log_level))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(connect(config.zenoh()).await?);
        let publisher = Publisher::new(session.clone(), config.key_prefix(), Format::default());
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            status: None,
            shutdown_tx,
            workers: Vec::new(),
        })
    }

    /// Announce `running` / `offline` on `<key_prefix>/@/status`.
    pub fn with_status_publishing(mut self) -> Self {
        self.status = Some(self.status_publisher());
        self
    }

    /// Set the payload format of published telemetry.
    pub fn with_format(mut self, format: Format) -> Self {
        self.publisher = Publisher::new(self.session.clone(), self.config.key_prefix(), format);
        if self.status.is_some() {
            self.status = Some(self.status_publisher());
        }
        self
    }

    fn status_publisher(&self) -> StatusPublisher {
        StatusPublisher::new(self.publisher.clone(), &self.name, &self.version)
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Receiver that flips to `true` when the bridge is shutting down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a named worker.
    ///
    /// Workers should return once the shutdown signal fires; stragglers are
    /// aborted after the grace period.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.workers.push(Worker {
            name: name.into(),
            handle: tokio::spawn(future),
        });
    }

    /// Run until Ctrl+C or SIGTERM, attaching `metadata` to every status message.
    pub async fn run_with_metadata(mut self, metadata: Option<serde_json::Value>) -> Result<()> {
        if let Some(status) = self.status.as_mut() {
            if let Some(metadata) = metadata {
                status.set_metadata(metadata);
            }
            if let Err(e) = status.announce(BridgeState::Running).await {
                tracing::warn!(error = %e, "Failed to publish running status");
            }
        }

        let worker_names: Vec<&str> = self.workers.iter().map(|w| w.name.as_str()).collect();
        tracing::info!(
            bridge = %self.name,
            workers = ?worker_names,
            "Bridge running. Press Ctrl+C to stop."
        );

        wait_for_signal().await;
        tracing::info!(bridge = %self.name, "Received shutdown signal");

        // Receivers may already be gone if every worker has exited.
        let _ = self.shutdown_tx.send(true);

        for Worker { name, handle } in self.workers.drain(..) {
            let abort = handle.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => tracing::debug!(worker = %name, "Worker stopped"),
                Ok(Err(e)) => tracing::error!(worker = %name, error = %e, "Worker failed"),
                Err(_) => {
                    tracing::warn!(worker = %name, "Worker did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        if let Some(status) = &self.status {
            if let Err(e) = status.announce(BridgeState::Offline).await {
                tracing::warn!(error = %e, "Failed to publish offline status");
            }
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Bridge stopped");
        Ok(())
    }
}

/// Resolve on Ctrl+C, or SIGTERM on Unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
