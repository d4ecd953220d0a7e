//! Dispatch supervisor.
//!
//! Every drained send request is handed to its own worker process so that a
//! crash or hang in one delivery cannot affect the daemon or other sends of
//! the same batch. The supervisor launches the whole batch first, then
//! awaits every worker; control only returns once all of them have exited.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::message::SendRequest;

/// How to invoke a worker process.
///
/// The dispatcher appends `--endpoint <id> --payload <json>` to the
/// configured program and leading arguments.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Leading arguments (e.g. the `worker` subcommand).
    pub args: Vec<String>,
}

impl WorkerSpec {
    /// Worker spec invoking an explicit program.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Worker spec invoking this executable's hidden `worker` subcommand.
    pub fn current_exe() -> Result<Self, std::io::Error> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["worker".to_string()],
        })
    }
}

/// Terminal status of one dispatched request.
#[derive(Debug)]
pub enum DispatchStatus {
    /// The worker exited with status zero.
    Delivered,
    /// The worker failed to spawn, exited non-zero, or was killed by a
    /// signal. No retry happens at this layer.
    Failed {
        /// Exit code, absent when killed by a signal or never spawned.
        exit_code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error (spawn error text when spawning failed).
        stderr: String,
    },
}

/// Outcome of one dispatched request, pairing the original request with its
/// worker's terminal status.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub request: SendRequest,
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    /// Whether the worker delivered the request.
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DispatchStatus::Delivered)
    }
}

/// Spawns and supervises one worker process per outbound request.
pub struct Dispatcher {
    endpoint_id: String,
    worker: WorkerSpec,
}

impl Dispatcher {
    /// Create a dispatcher for an endpoint.
    pub fn new(endpoint_id: impl Into<String>, worker: WorkerSpec) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            worker,
        }
    }

    /// Dispatch a batch: launch one worker per request, then await them all.
    ///
    /// Returns exactly one outcome per request. Outcomes are collected and
    /// logged in completion order, which is unrelated to launch order; the
    /// workers of a batch run concurrently as independent OS processes.
    pub async fn dispatch(&self, batch: Vec<SendRequest>) -> Vec<DispatchOutcome> {
        let total = batch.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut workers = JoinSet::new();

        // Fire all workers before awaiting any of them
        for request in batch {
            let payload = match serde_json::to_string(&request) {
                Ok(p) => p,
                Err(e) => {
                    outcomes.push(self.failed(request, None, String::new(), e.to_string()));
                    continue;
                }
            };

            let spawned = Command::new(&self.worker.program)
                .args(&self.worker.args)
                .arg("--endpoint")
                .arg(&self.endpoint_id)
                .arg("--payload")
                .arg(&payload)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn();

            match spawned {
                Ok(child) => {
                    debug!(to = %request.to, pid = child.id(), "worker launched");
                    workers
                        .spawn(async move { (request, child.wait_with_output().await) });
                }
                Err(e) => {
                    outcomes.push(self.failed(
                        request,
                        None,
                        String::new(),
                        format!("failed to spawn worker: {e}"),
                    ));
                }
            }
        }

        // Await the full batch; the next iteration must not start until
        // every worker has exited
        while let Some(joined) = workers.join_next().await {
            let (request, waited) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "worker supervision task failed");
                    continue;
                }
            };

            match waited {
                Ok(output) if output.status.success() => {
                    info!(
                        endpoint = %self.endpoint_id,
                        to = %request.to,
                        "sms delivered by worker"
                    );
                    outcomes.push(DispatchOutcome {
                        request,
                        status: DispatchStatus::Delivered,
                    });
                }
                Ok(output) => {
                    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    outcomes.push(self.failed(request, output.status.code(), stdout, stderr));
                }
                Err(e) => {
                    outcomes.push(self.failed(
                        request,
                        None,
                        String::new(),
                        format!("failed to collect worker output: {e}"),
                    ));
                }
            }
        }

        debug!(
            endpoint = %self.endpoint_id,
            total,
            delivered = outcomes.iter().filter(|o| o.is_delivered()).count(),
            "dispatch batch complete"
        );
        outcomes
    }

    fn failed(
        &self,
        request: SendRequest,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    ) -> DispatchOutcome {
        error!(
            endpoint = %self.endpoint_id,
            to = %request.to,
            text = %request.text,
            exit_code = ?exit_code,
            stderr = %stderr.trim(),
            "worker failed to deliver sms"
        );
        DispatchOutcome {
            request,
            status: DispatchStatus::Failed {
                exit_code,
                stdout,
                stderr,
            },
        }
    }
}
