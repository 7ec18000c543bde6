//! Service runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use plcgate_common::{Format, LoggingConfig, NodeKeyBuilder, connect, init_tracing};

use crate::ServiceArgs;
use crate::config::ServiceConfig;
use crate::error::{ServiceError, Result};
use crate::publisher::Publisher;
use crate::status::{ServiceState, StatusPublisher};

/// How long spawned tasks get to finish after cancellation before being aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Runner that owns a service's Zenoh session and its worker tasks.
///
/// Handles:
/// - Logging initialization
/// - Zenoh session
/// - Task spawning with a shared [`CancellationToken`]
/// - Graceful shutdown on Ctrl+C (or when the token is cancelled)
/// - Status publishing on `<key_prefix>/@/status`
///
/// # Example
///
/// ```ignore
/// let args = ServiceArgs::parse_with_default("gateway.json5");
/// let config = GatewayConfig::load_or_default(&args.config)?;
/// let mut runner =
///     ServiceRunner::new_with_args("gateway", config, Some(&args), Format::Json).await?;
///
/// let token = runner.child_token();
/// runner.spawn("worker", async move { token.cancelled().await });
///
/// runner.run().await?;
/// ```
pub struct ServiceRunner<C: ServiceConfig> {
    name: String,
    version: String,
    config: C,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status: StatusPublisher,
    shutdown: CancellationToken,
    signal_task: JoinHandle<()>,
    tasks: Vec<(String, JoinHandle<()>)>,
    grace: Duration,
}

impl<C: ServiceConfig> ServiceRunner<C> {
    /// Create a new runner with CLI args for log level override.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&ServiceArgs>,
        format: Format,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|a| a.log_level.clone()) {
            Some(level) => LoggingConfig {
                level,
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| ServiceError::config(e.to_string()))?;

        tracing::info!(service = %name, version = %version, "Starting service");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| ServiceError::ZenohSession(e.to_string()))?,
        );

        let publisher = Publisher::new(session.clone(), format);
        let status = StatusPublisher::new(
            publisher.clone(),
            NodeKeyBuilder::new(config.key_prefix()).status_key(),
            &name,
            &version,
        );

        if let Err(e) = status.publish(ServiceState::Starting, None).await {
            tracing::warn!(error = %e, "Failed to publish starting status");
        }

        let shutdown = CancellationToken::new();
        let signal_task = tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            status,
            shutdown,
            signal_task,
            tasks: Vec::new(),
            grace: SHUTDOWN_GRACE,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    pub fn status(&self) -> &StatusPublisher {
        &self.status
    }

    /// A child of the shutdown token, for handing to one worker.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Spawn a tracked worker task.
    ///
    /// Workers should watch a token from [`child_token`](Self::child_token)
    /// and return on cancellation; stragglers are aborted after the grace
    /// period.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push((name.into(), handle));
    }

    /// Run until Ctrl+C is received or the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        self.run_with_metadata(None).await
    }

    /// Run with custom status metadata.
    ///
    /// 1. Publish "running" status
    /// 2. Wait for the shutdown signal
    /// 3. Cancel workers and wait for them (up to the grace period)
    /// 4. Publish "offline" status
    /// 5. Close the Zenoh session
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        if let Err(e) = self.status.publish(ServiceState::Running, metadata).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            service = %self.name,
            tasks = self.tasks.len(),
            "Service running. Press Ctrl+C to stop."
        );

        self.shutdown.cancelled().await;

        tracing::info!(service = %self.name, "Shutting down");

        self.shutdown.cancel();
        shutdown_tasks(self.tasks, self.grace).await;
        self.signal_task.abort();

        if let Err(e) = self.status.publish(ServiceState::Offline, None).await {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(service = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Wait for cancelled workers to return, aborting any still running once the
/// grace period has elapsed.
async fn shutdown_tasks(tasks: Vec<(String, JoinHandle<()>)>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;

    for (name, mut task) in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => tracing::debug!(worker = %name, "Worker stopped"),
            Ok(Err(e)) => tracing::warn!(worker = %name, error = %e, "Worker ended abnormally"),
            Err(_) => {
                tracing::warn!(worker = %name, "Worker did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
            token.cancel();
        }
        () = token.cancelled() => {}
    }
}
