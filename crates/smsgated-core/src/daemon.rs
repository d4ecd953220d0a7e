//! Daemon lifecycle controller.
//!
//! Owns the endpoint for the lifetime of the process and drives the control
//! loop: drain the queue, dispatch the batch to worker processes, poll the
//! adapter for inbound messages, check the inactivity watchdog. Termination
//! signals and the watchdog take effect only between iterations; a batch
//! that has been launched always runs to completion.
//!
//! Lifecycle: `Init → Running → Stopping → Stopped`. Startup acquires the
//! per-endpoint uniqueness lock and creates the queue; shutdown destroys the
//! queue and releases the lock.

use std::path::Path;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

use smsgated_config::AppConfig;

use crate::adapter::DeviceAdapter;
use crate::dispatch::{DispatchOutcome, Dispatcher, WorkerSpec};
use crate::inbound::{InboundStore, poll_inbound};
use crate::lock::{EndpointLock, LockError};
use crate::queue::{DrainedBatch, MessageQueue, QueueError, QueueSettings};
use crate::watchdog::Watchdog;
use crate::build_info;

/// Shutdown request sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// Handle for requesting a graceful daemon shutdown from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownHandle {
    /// Request a graceful shutdown. Takes effect between iterations.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ShutdownSignal);
    }
}

/// Lifecycle states of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Init,
    Running,
    Stopping,
    Stopped,
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The smsgated daemon: one instance, one endpoint.
pub struct Daemon {
    config: AppConfig,
    adapter: Box<dyn DeviceAdapter>,
    store: Box<dyn InboundStore>,
    worker: WorkerSpec,
    state: DaemonState,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Daemon {
    /// Create a daemon bound to one endpoint, with the adapter already
    /// instantiated from the endpoint configuration.
    pub fn new(
        config: AppConfig,
        adapter: Box<dyn DeviceAdapter>,
        store: Box<dyn InboundStore>,
        worker: WorkerSpec,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            adapter,
            store,
            worker,
            state: DaemonState::Init,
            shutdown_tx,
        }
    }

    /// Handle for requesting shutdown while [`run`](Self::run) is executing.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// The daemon's configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the daemon until a termination signal or watchdog expiry.
    pub async fn run(&mut self) -> Result<(), DaemonError> {
        let endpoint_id = self.config.endpoint.id.clone();
        let owner = self.config.endpoint.owner.clone();

        info!(
            endpoint = %endpoint_id,
            adapter = %self.adapter.kind(),
            version = %build_info::version_string(),
            "smsgated daemon starting"
        );

        // INIT: uniqueness lock first, then the queue; watchdog starts now
        let _lock = EndpointLock::acquire(
            Path::new(&self.config.daemon.lock_dir),
            &endpoint_id,
        )?;
        let queue = MessageQueue::create(
            &endpoint_id,
            QueueSettings {
                depth: self.config.daemon.queue_depth,
                msg_bytes: self.config.daemon.queue_msg_bytes,
            },
        )?;
        let mut watchdog = Watchdog::new(Duration::from_secs(
            self.config.daemon.watchdog_timeout_secs,
        ));
        let dispatcher = Dispatcher::new(endpoint_id.clone(), self.worker.clone());
        let loop_delay = Duration::from_millis(self.config.daemon.loop_delay_ms);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let (mut sigterm, mut sigint, mut sighup, mut sigusr1) = {
            use tokio::signal::unix::{SignalKind, signal};
            (
                signal(SignalKind::terminate())?,
                signal(SignalKind::interrupt())?,
                signal(SignalKind::hangup())?,
                signal(SignalKind::user_defined1())?,
            )
        };

        self.state = DaemonState::Running;
        info!(endpoint = %endpoint_id, "daemon running");

        loop {
            // Yield delay between iterations; termination is only observed
            // here, never mid-iteration
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(endpoint = %endpoint_id, "shutdown requested");
                    break;
                }
                _ = sigterm.recv() => {
                    info!(endpoint = %endpoint_id, "SIGTERM received, stopping");
                    break;
                }
                _ = sigint.recv() => {
                    info!(endpoint = %endpoint_id, "SIGINT received, stopping");
                    break;
                }
                _ = sighup.recv() => {
                    warn!(endpoint = %endpoint_id, "ignoring SIGHUP");
                    continue;
                }
                _ = sigusr1.recv() => {
                    warn!(endpoint = %endpoint_id, "ignoring SIGUSR1");
                    continue;
                }
                _ = sleep(loop_delay) => {}
            }

            let outcomes = dispatch_batch(&dispatcher, &mut watchdog, queue.drain()).await;
            let failed = outcomes.iter().filter(|o| !o.is_delivered()).count();
            if failed > 0 {
                warn!(endpoint = %endpoint_id, failed, "batch completed with failures");
            }

            poll_inbound(
                self.adapter.as_mut(),
                self.store.as_ref(),
                &owner,
                &endpoint_id,
            )
            .await;

            if watchdog.should_terminate() {
                info!(
                    endpoint = %endpoint_id,
                    idle_secs = watchdog.idle_for().as_secs(),
                    "inactivity threshold exceeded, stopping"
                );
                break;
            }
        }

        self.state = DaemonState::Stopping;
        info!(endpoint = %endpoint_id, "daemon stopping");

        queue.destroy()?;
        // _lock drops here, releasing the per-endpoint lock

        self.state = DaemonState::Stopped;
        info!(endpoint = %endpoint_id, "daemon stopped");
        Ok(())
    }
}

/// Dispatch whatever one drain pass produced.
///
/// A drain that ended on a queue failure still yields its partial batch, and
/// that batch is dispatched in full; only an actually empty batch skips the
/// watchdog reset and the dispatcher.
async fn dispatch_batch(
    dispatcher: &Dispatcher,
    watchdog: &mut Watchdog,
    drained: DrainedBatch,
) -> Vec<DispatchOutcome> {
    if drained.error.is_some() && !drained.requests.is_empty() {
        warn!(
            partial = drained.requests.len(),
            "queue drain failed, dispatching partial batch"
        );
    }
    if drained.requests.is_empty() {
        return Vec::new();
    }
    watchdog.touch();
    dispatcher.dispatch(drained.requests).await
}
