//! Test environment and configuration builders.
//!
//! [`TestEnv`] produces an [`AppConfig`] whose paths live inside an owned
//! temp directory and whose endpoint id is unique per test, so tests never
//! collide on queue names or lock files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use smsgated_config::AppConfig;
use tempfile::TempDir;

/// Produce an endpoint id unique across tests and test processes.
pub fn unique_endpoint_id(tag: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{tag}-{}-{n}", std::process::id())
}

/// A test-scoped daemon environment with an owned temp directory.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestEnv {
    pub config: AppConfig,
    _temp_dir: TempDir,
}

impl TestEnv {
    /// Create a config with a unique endpoint id, tempdir-backed paths,
    /// a spool adapter, and fast loop timings.
    pub fn new(tag: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let spool_dir = temp_dir.path().join("spool");

        let mut config = AppConfig::default();
        config.endpoint.id = unique_endpoint_id(tag);
        config.endpoint.owner = "tester".to_string();
        config.endpoint.adapter = "spool".to_string();
        config.endpoint.params.insert(
            "dir".to_string(),
            spool_dir.to_string_lossy().into_owned(),
        );
        config.daemon.lock_dir = temp_dir
            .path()
            .join("locks")
            .to_string_lossy()
            .into_owned();
        config.daemon.loop_delay_ms = 25;
        config.daemon.watchdog_timeout_secs = 2;
        config.storage.inbox_path = temp_dir
            .path()
            .join("inbox.jsonl")
            .to_string_lossy()
            .into_owned();

        config.validate().expect("test config must validate");
        Self {
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Builder: set the inactivity threshold in seconds.
    pub fn watchdog_secs(mut self, secs: u64) -> Self {
        self.config.daemon.watchdog_timeout_secs = secs;
        self
    }

    /// Builder: set the iteration yield delay in milliseconds.
    pub fn loop_delay_ms(mut self, ms: u64) -> Self {
        self.config.daemon.loop_delay_ms = ms;
        self
    }

    /// The spool adapter directory inside the temp dir.
    pub fn spool_dir(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .endpoint
                .params
                .get("dir")
                .expect("spool dir param"),
        )
    }

    /// The JSONL inbox path inside the temp dir.
    pub fn inbox_path(&self) -> PathBuf {
        PathBuf::from(&self.config.storage.inbox_path)
    }
}
