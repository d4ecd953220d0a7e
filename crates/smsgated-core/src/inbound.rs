//! Inbound ingestion.
//!
//! Once per daemon iteration, [`poll_inbound`] asks the bound adapter for
//! received messages — if, and only if, the adapter declares read support —
//! and forwards each one to the persistence collaborator. Failures are
//! contained per message: a read error skips this iteration's inbound, a
//! store error skips that one message, and neither stops the daemon.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::BoxFuture;
use crate::adapter::DeviceAdapter;

/// Errors from the inbound persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store rejected message: {0}")]
    Rejected(String),
}

/// Persistence collaborator for inbound messages.
///
/// The daemon only depends on this contract; the reference implementation
/// is [`JsonlInbox`].
pub trait InboundStore: Send + Sync {
    /// Persist one inbound message for the owning user of an endpoint.
    fn receive<'a>(
        &'a self,
        user: &'a str,
        endpoint: &'a str,
        text: &'a str,
        origin: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// One persisted inbound message as written by [`JsonlInbox`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxRecord {
    /// Unix timestamp (seconds) at persist time.
    pub received_at: u64,
    pub user: String,
    pub endpoint: String,
    pub origin: String,
    pub text: String,
}

/// Reference store appending one JSON line per inbound message.
pub struct JsonlInbox {
    path: PathBuf,
}

impl JsonlInbox {
    /// Create a store writing to the given file path. The parent directory
    /// is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &InboxRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

impl InboundStore for JsonlInbox {
    fn receive<'a>(
        &'a self,
        user: &'a str,
        endpoint: &'a str,
        text: &'a str,
        origin: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let record = InboxRecord {
                received_at: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
                user: user.to_string(),
                endpoint: endpoint.to_string(),
                origin: origin.to_string(),
                text: text.to_string(),
            };
            self.append(&record).await
        })
    }
}

/// Poll the adapter once and persist whatever it reports.
///
/// Returns the number of messages persisted. Adapters without read support
/// are not called at all; a read error or an empty read both yield zero.
pub async fn poll_inbound(
    adapter: &mut dyn DeviceAdapter,
    store: &dyn InboundStore,
    user: &str,
    endpoint_id: &str,
) -> usize {
    if !adapter.supports_read() {
        return 0;
    }

    let batch = match adapter.read().await {
        Ok(batch) => batch,
        Err(e) => {
            error!(
                endpoint = %endpoint_id,
                adapter = %adapter.kind(),
                error = %e,
                "adapter read failed, skipping inbound for this iteration"
            );
            return 0;
        }
    };
    if batch.is_empty() {
        return 0;
    }

    debug!(endpoint = %endpoint_id, count = batch.len(), "inbound messages fetched");

    let mut stored = 0;
    for sms in &batch {
        match store.receive(user, endpoint_id, &sms.text, &sms.origin).await {
            Ok(()) => {
                info!(
                    endpoint = %endpoint_id,
                    origin = %sms.origin,
                    "inbound sms stored"
                );
                stored += 1;
            }
            Err(e) => {
                // Partial failure: keep going with the rest of the batch
                error!(
                    endpoint = %endpoint_id,
                    origin = %sms.origin,
                    error = %e,
                    "failed to store inbound sms"
                );
            }
        }
    }
    stored
}
