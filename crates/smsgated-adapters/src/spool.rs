//! Directory spool adapter.
//!
//! Sends are written as JSON files into `<dir>/outbox`; inbound messages
//! are JSON files ([`InboundSms`] shape) dropped into `<dir>/inbox` by some
//! external process and consumed (deleted) on read. Intended for
//! development, demos, and the test suite — it exercises the full daemon
//! path without any device attached.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use smsgated_core::BoxFuture;
use smsgated_core::adapter::{AdapterError, DeviceAdapter};
use smsgated_core::message::{InboundSms, SendRequest};

/// Adapter type selector for the registry.
pub const KIND: &str = "spool";

/// File-spool device adapter.
#[derive(Debug)]
pub struct SpoolAdapter {
    outbox: PathBuf,
    inbox: PathBuf,
    seq: u64,
}

impl SpoolAdapter {
    /// Build from endpoint params. Requires a `dir` param; `<dir>/outbox`
    /// and `<dir>/inbox` are created if missing.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AdapterError> {
        let dir = params
            .get("dir")
            .ok_or_else(|| AdapterError::Config("spool adapter requires a 'dir' param".into()))?;
        let base = PathBuf::from(dir);
        let outbox = base.join("outbox");
        let inbox = base.join("inbox");
        std::fs::create_dir_all(&outbox)?;
        std::fs::create_dir_all(&inbox)?;

        Ok(Self {
            outbox,
            inbox,
            seq: 0,
        })
    }

    /// Where sends are spooled to.
    pub fn outbox_dir(&self) -> &PathBuf {
        &self.outbox
    }

    /// Where inbound messages are consumed from.
    pub fn inbox_dir(&self) -> &PathBuf {
        &self.inbox
    }
}

impl DeviceAdapter for SpoolAdapter {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn supports_read(&self) -> bool {
        true
    }

    fn read(&mut self) -> BoxFuture<'_, Result<Vec<InboundSms>, AdapterError>> {
        Box::pin(async move {
            let mut names = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.inbox).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.path().extension().is_some_and(|e| e == "json") {
                    names.push(entry.path());
                }
            }
            // Producers name files monotonically; sort for a stable order
            names.sort();

            // Per-file error containment: a message already consumed must
            // never be lost because a later file fails
            let mut batch = Vec::new();
            for path in names {
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "inbox file unreadable, leaving for next poll");
                        continue;
                    }
                };
                match serde_json::from_slice::<InboundSms>(&bytes) {
                    Ok(sms) => {
                        if let Err(e) = tokio::fs::remove_file(&path).await {
                            warn!(path = %path.display(), error = %e, "failed to remove consumed inbox file");
                        }
                        batch.push(sms);
                    }
                    Err(e) => {
                        // Quarantine the file so one bad drop does not wedge
                        // every later read
                        warn!(path = %path.display(), error = %e, "unreadable inbox file, quarantining");
                        let _ = tokio::fs::rename(&path, path.with_extension("bad")).await;
                    }
                }
            }
            Ok(batch)
        })
    }

    fn send<'a>(
        &'a mut self,
        request: &'a SendRequest,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            self.seq += 1;
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            let path = self
                .outbox
                .join(format!("{millis}-{:06}.json", self.seq));
            let bytes = serde_json::to_vec(request)
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;
            tokio::fs::write(&path, bytes).await?;
            debug!(to = %request.to, path = %path.display(), "send spooled");
            Ok(())
        })
    }
}
