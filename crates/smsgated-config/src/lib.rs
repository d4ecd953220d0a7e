#![deny(unsafe_code)]

//! Configuration loading and validation for smsgated.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure:
//! the endpoint this daemon instance manages, daemon loop timings, storage
//! paths for inbound traffic, and logging.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The endpoint (device/gateway) this daemon instance manages.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Daemon loop and queue configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage configuration for inbound messages.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The single endpoint a daemon instance is bound to.
///
/// Immutable for the lifetime of the daemon; exactly one running daemon may
/// exist per endpoint `id` at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint identity, used to derive the queue name and the lock file.
    /// Restricted to `[A-Za-z0-9._-]`.
    #[serde(default = "default_endpoint_id")]
    pub id: String,

    /// Owning-user identity, recorded with every persisted inbound message.
    #[serde(default = "default_endpoint_owner")]
    pub owner: String,

    /// Adapter type selector (e.g. "spool", "http").
    #[serde(default = "default_endpoint_adapter")]
    pub adapter: String,

    /// Adapter-specific configuration values, passed through opaquely.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            id: default_endpoint_id(),
            owner: default_endpoint_owner(),
            adapter: default_endpoint_adapter(),
            params: HashMap::new(),
        }
    }
}

fn default_endpoint_id() -> String {
    "default".to_string()
}

fn default_endpoint_owner() -> String {
    "root".to_string()
}

fn default_endpoint_adapter() -> String {
    "spool".to_string()
}

/// Configuration for the daemon control loop and the per-endpoint queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Yield delay between control-loop iterations, in milliseconds.
    #[serde(default = "default_loop_delay_ms")]
    pub loop_delay_ms: u64,

    /// Inactivity threshold after which the daemon terminates itself,
    /// in seconds.
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,

    /// Directory holding per-endpoint lock files.
    #[serde(default = "default_lock_dir")]
    pub lock_dir: String,

    /// Maximum number of messages the queue holds before producers block.
    /// Subject to the kernel's `fs.mqueue.msg_max` limit for unprivileged
    /// processes.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: i64,

    /// Maximum serialized size of a single queue message, in bytes.
    /// Subject to the kernel's `fs.mqueue.msgsize_max` limit.
    #[serde(default = "default_queue_msg_bytes")]
    pub queue_msg_bytes: i64,

    /// Worker program invoked once per outbound request. Defaults to the
    /// daemon's own executable (hidden `worker` subcommand).
    #[serde(default)]
    pub worker_program: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            loop_delay_ms: default_loop_delay_ms(),
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            lock_dir: default_lock_dir(),
            queue_depth: default_queue_depth(),
            queue_msg_bytes: default_queue_msg_bytes(),
            worker_program: None,
        }
    }
}

fn default_loop_delay_ms() -> u64 {
    500
}

fn default_watchdog_timeout_secs() -> u64 {
    300 // 5 minutes
}

fn default_lock_dir() -> String {
    "/tmp/smsgated".to_string()
}

fn default_queue_depth() -> i64 {
    10
}

fn default_queue_msg_bytes() -> i64 {
    8192
}

/// Storage configuration for inbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSONL file inbound messages are appended to.
    #[serde(default = "default_inbox_path")]
    pub inbox_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            inbox_path: default_inbox_path(),
        }
    }
}

fn default_inbox_path() -> String {
    "data/inbox.jsonl".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.id.is_empty() {
            return Err(ConfigError::Validation(
                "endpoint.id must not be empty".to_string(),
            ));
        }
        // The id becomes part of a queue name and a lock file name
        if !self
            .endpoint
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::Validation(format!(
                "endpoint.id must match [A-Za-z0-9._-], got {:?}",
                self.endpoint.id
            )));
        }
        if self.endpoint.owner.is_empty() {
            return Err(ConfigError::Validation(
                "endpoint.owner must not be empty".to_string(),
            ));
        }
        if self.endpoint.adapter.is_empty() {
            return Err(ConfigError::Validation(
                "endpoint.adapter must not be empty".to_string(),
            ));
        }
        if self.daemon.loop_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "daemon.loop_delay_ms must be non-zero".to_string(),
            ));
        }
        if self.daemon.watchdog_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "daemon.watchdog_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.daemon.lock_dir.is_empty() {
            return Err(ConfigError::Validation(
                "daemon.lock_dir must not be empty".to_string(),
            ));
        }
        if self.daemon.queue_depth <= 0 {
            return Err(ConfigError::Validation(format!(
                "daemon.queue_depth must be positive, got {}",
                self.daemon.queue_depth
            )));
        }
        if self.daemon.queue_msg_bytes <= 0 {
            return Err(ConfigError::Validation(format!(
                "daemon.queue_msg_bytes must be positive, got {}",
                self.daemon.queue_msg_bytes
            )));
        }
        if self.storage.inbox_path.is_empty() {
            return Err(ConfigError::Validation(
                "storage.inbox_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config must validate");
        assert_eq!(config.daemon.watchdog_timeout_secs, 300);
        assert_eq!(config.daemon.loop_delay_ms, 500);
        assert_eq!(config.endpoint.adapter, "spool");
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [endpoint]
            id = "office-gw1"
            owner = "ops"
            adapter = "http"

            [endpoint.params]
            send_url = "https://sms.example.com/send"

            [daemon]
            loop_delay_ms = 250
            watchdog_timeout_secs = 600
            queue_depth = 8

            [storage]
            inbox_path = "/var/lib/smsgated/inbox.jsonl"

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml_str).unwrap();
        assert_eq!(config.endpoint.id, "office-gw1");
        assert_eq!(config.endpoint.owner, "ops");
        assert_eq!(
            config.endpoint.params.get("send_url").map(String::as_str),
            Some("https://sms.example.com/send")
        );
        assert_eq!(config.daemon.loop_delay_ms, 250);
        assert_eq!(config.daemon.queue_depth, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_empty_string_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.endpoint.id, "default");
        assert_eq!(config.daemon.queue_msg_bytes, 8192);
    }

    #[test]
    fn test_rejects_empty_endpoint_id() {
        let err = AppConfig::parse("[endpoint]\nid = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_endpoint_id_with_slash() {
        let err = AppConfig::parse("[endpoint]\nid = \"a/b\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_zero_watchdog_timeout() {
        let err = AppConfig::parse("[daemon]\nwatchdog_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_negative_queue_depth() {
        let err = AppConfig::parse("[daemon]\nqueue_depth = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let err = AppConfig::parse("not toml at all {{{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("smsgated.toml");
        tokio::fs::write(&path, "[endpoint]\nid = \"gw2\"")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.endpoint.id, "gw2");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let err = AppConfig::load(Path::new("/nonexistent/smsgated.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
