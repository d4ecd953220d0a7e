#![deny(unsafe_code)]

//! smsgated CLI — control plane for the SMS gateway daemon.
//!
//! `start` runs the daemon in the foreground; `send` enqueues an outbound
//! message onto a running daemon's queue; `status` and `stop` inspect and
//! signal a running daemon through its lock file. The hidden `worker`
//! subcommand is the per-message delivery process the daemon spawns — it is
//! not meant to be invoked by hand.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use smsgated_config::AppConfig;
use smsgated_core::dispatch::WorkerSpec;
use smsgated_core::lock::EndpointLock;
use smsgated_core::message::SendRequest;
use smsgated_core::queue::{MessageQueue, QueueProducer, QueueSettings};
use smsgated_core::{Daemon, JsonlInbox};

/// smsgated — single-endpoint SMS gateway daemon.
#[derive(Parser)]
#[command(name = "smsgated", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, default_value = "smsgated.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon for the configured endpoint (foreground).
    Start,

    /// Enqueue an outbound SMS for a running daemon to deliver.
    Send {
        /// Destination number.
        #[arg(long)]
        to: String,
        /// Message text.
        #[arg(long)]
        text: String,
    },

    /// Show daemon and queue status for the configured endpoint.
    Status,

    /// Ask a running daemon to stop (sends SIGTERM to the lock holder).
    Stop,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Delivery worker: send one message and exit. Spawned by the daemon.
    #[command(hide = true)]
    Worker {
        /// Endpoint the request belongs to.
        #[arg(long)]
        endpoint: String,
        /// The send request as JSON.
        #[arg(long)]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    // Config sets the base filter; -v flags and RUST_LOG override it
    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start => cmd_start(config, &cli.config).await?,
        Commands::Send { to, text } => cmd_send(&config, &to, &text)?,
        Commands::Status => cmd_status(&config)?,
        Commands::Stop => cmd_stop(&config)?,
        Commands::Config { show } => cmd_config(&config, &cli.config, show)?,
        Commands::Worker { endpoint, payload } => cmd_worker(&config, &endpoint, &payload).await?,
    }

    Ok(())
}

async fn cmd_start(config: AppConfig, config_path: &Path) -> Result<()> {
    let adapter =
        smsgated_adapters::build(&config.endpoint).context("failed to build device adapter")?;
    let store = Box::new(JsonlInbox::new(&config.storage.inbox_path));
    let worker = worker_spec(&config, config_path)?;

    let mut daemon = Daemon::new(config, adapter, store, worker);
    daemon.run().await.context("daemon exited with an error")?;
    Ok(())
}

/// Resolve how the daemon invokes delivery workers: an explicitly configured
/// program, or this executable's own hidden `worker` subcommand.
fn worker_spec(config: &AppConfig, config_path: &Path) -> Result<WorkerSpec> {
    match &config.daemon.worker_program {
        Some(program) => Ok(WorkerSpec::new(program, Vec::new())),
        None => {
            let mut spec = WorkerSpec::current_exe()
                .context("failed to locate the smsgated executable")?;
            // The worker re-reads the same config to build its adapter
            spec.args = vec![
                "--config".to_string(),
                config_path.display().to_string(),
                "worker".to_string(),
            ];
            Ok(spec)
        }
    }
}

fn cmd_send(config: &AppConfig, to: &str, text: &str) -> Result<()> {
    let endpoint_id = &config.endpoint.id;
    let producer = QueueProducer::open(endpoint_id, queue_settings(config))
        .with_context(|| format!("failed to open queue for endpoint '{endpoint_id}'"))?;
    producer
        .enqueue(&SendRequest::new(to, text))
        .context("failed to enqueue send request")?;
    producer.close().context("failed to close queue handle")?;

    if EndpointLock::holder_pid(Path::new(&config.daemon.lock_dir), endpoint_id)?.is_none() {
        warn!(endpoint = %endpoint_id, "no daemon is running; the message waits in the queue");
    }
    println!("queued sms to {to} on endpoint '{endpoint_id}'");
    Ok(())
}

fn cmd_status(config: &AppConfig) -> Result<()> {
    let endpoint_id = &config.endpoint.id;
    println!("smsgated {}", smsgated_core::build_info::version_string());
    println!("endpoint '{endpoint_id}' (adapter '{}')", config.endpoint.adapter);

    match EndpointLock::holder_pid(Path::new(&config.daemon.lock_dir), endpoint_id)? {
        Some(pid) => println!("daemon:  running (pid {pid})"),
        None => println!("daemon:  not running"),
    }
    match MessageQueue::probe_depth(endpoint_id)? {
        Some(depth) => println!("queue:   {depth} message(s) pending"),
        None => println!("queue:   not created"),
    }
    Ok(())
}

fn cmd_stop(config: &AppConfig) -> Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let endpoint_id = &config.endpoint.id;
    let Some(pid) = EndpointLock::holder_pid(Path::new(&config.daemon.lock_dir), endpoint_id)?
    else {
        println!("no running daemon for endpoint '{endpoint_id}'");
        return Ok(());
    };

    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .with_context(|| format!("failed to signal daemon pid {pid}"))?;
    info!(endpoint = %endpoint_id, pid, "sent SIGTERM to daemon");
    println!("stopping daemon for endpoint '{endpoint_id}' (pid {pid})");
    Ok(())
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render configuration")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// One delivery, one process: parse the payload, send it through the
/// endpoint's adapter, and let the exit status report the outcome.
async fn cmd_worker(config: &AppConfig, endpoint: &str, payload: &str) -> Result<()> {
    if endpoint != config.endpoint.id {
        bail!(
            "worker invoked for endpoint '{endpoint}' but configuration is for '{}'",
            config.endpoint.id
        );
    }

    let request: SendRequest =
        serde_json::from_str(payload).context("invalid send request payload")?;
    let mut adapter =
        smsgated_adapters::build(&config.endpoint).context("failed to build device adapter")?;

    adapter
        .send(&request)
        .await
        .with_context(|| format!("delivery to {} failed", request.to))?;
    info!(endpoint, to = %request.to, "delivered");
    Ok(())
}

fn queue_settings(config: &AppConfig) -> QueueSettings {
    QueueSettings {
        depth: config.daemon.queue_depth,
        msg_bytes: config.daemon.queue_msg_bytes,
    }
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from '{}'", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}
