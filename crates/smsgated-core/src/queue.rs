//! Per-endpoint POSIX message queue.
//!
//! The queue name is derived deterministically from a fixed namespace prefix
//! plus the endpoint identity, so producers can reach a daemon knowing only
//! the endpoint id. The daemon side ([`MessageQueue`]) creates the queue at
//! startup, drains it without blocking, and unlinks it on shutdown.
//! Producers ([`QueueProducer`]) only ever enqueue.
//!
//! Default queue attributes are sized to the unprivileged Linux mqueue
//! limits (`fs.mqueue.msg_max`, `fs.mqueue.msgsize_max`); both are
//! configurable for tuned hosts.

use std::ffi::CString;

use nix::errno::Errno;
use nix::mqueue::{
    MQ_OFlag, MqAttr, MqdT, mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_unlink,
};
use nix::sys::stat::Mode;
use tracing::{debug, error, warn};

use crate::message::{QueueEnvelope, SendRequest};

/// Namespace prefix for queue names, followed by the endpoint id.
pub const QUEUE_NAME_PREFIX: &str = "/smsgated-";

/// Derive the queue name for an endpoint.
pub fn queue_name(endpoint_id: &str) -> String {
    format!("{QUEUE_NAME_PREFIX}{endpoint_id}")
}

/// Errors from queue operations.
///
/// An empty queue is not an error; it ends a drain normally.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue operation failed: {0}")]
    Sys(#[from] Errno),

    #[error("queue name contains an interior NUL byte")]
    Name(#[from] std::ffi::NulError),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("payload too large: {len} bytes exceeds queue limit of {max}")]
    Oversize { len: usize, max: usize },
}

/// Queue creation attributes.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    /// Maximum number of queued messages.
    pub depth: i64,
    /// Maximum size of a single message, in bytes.
    pub msg_bytes: i64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            depth: 10,
            msg_bytes: 8192,
        }
    }
}

/// Result of one drain pass.
///
/// When `error` is set, the drain stopped early on a queue failure; the
/// requests collected up to that point are still valid and must still be
/// dispatched by the caller.
#[derive(Debug)]
pub struct DrainedBatch {
    /// Send requests in queue delivery (FIFO) order.
    pub requests: Vec<SendRequest>,
    /// The failure that ended the drain, if it did not end on an empty queue.
    pub error: Option<QueueError>,
}

/// Consumer side of the per-endpoint queue. Exclusively owned by the daemon
/// for its lifetime: created at startup, destroyed at shutdown.
pub struct MessageQueue {
    mqd: MqdT,
    name: CString,
    msg_bytes: usize,
}

impl MessageQueue {
    /// Create (or attach to) the endpoint's queue for consuming.
    ///
    /// Opened non-blocking: a drain never waits for producers. If the queue
    /// already exists its attributes win; the receive buffer is sized from
    /// the effective attributes.
    pub fn create(endpoint_id: &str, settings: QueueSettings) -> Result<Self, QueueError> {
        let name = CString::new(queue_name(endpoint_id))?;
        let attr = MqAttr::new(0, settings.depth, settings.msg_bytes, 0);
        let oflag = MQ_OFlag::O_CREAT | MQ_OFlag::O_RDONLY | MQ_OFlag::O_NONBLOCK;
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;

        let mqd = mq_open(name.as_c_str(), oflag, mode, Some(&attr))?;
        let effective = mq_getattr(&mqd)?;
        debug!(
            queue = %name.to_string_lossy(),
            depth = effective.maxmsg(),
            msg_bytes = effective.msgsize(),
            "message queue opened"
        );

        Ok(Self {
            mqd,
            name,
            msg_bytes: effective.msgsize() as usize,
        })
    }

    /// Drain all pending send requests without blocking.
    ///
    /// Receives until the queue reports empty. Traffic that is not a valid
    /// `send` envelope is logged and skipped. On any queue failure other
    /// than empty, the error is recorded as critical and the partial batch
    /// is returned; the caller dispatches whatever was collected.
    pub fn drain(&self) -> DrainedBatch {
        let mut requests = Vec::new();
        let mut buf = vec![0u8; self.msg_bytes];
        let mut prio = 0u32;

        loop {
            match mq_receive(&self.mqd, &mut buf, &mut prio) {
                Ok(len) => match QueueEnvelope::decode(&buf[..len]) {
                    Ok(QueueEnvelope::Send(request)) => {
                        debug!(to = %request.to, "send request drained");
                        requests.push(request);
                    }
                    Err(e) => {
                        warn!(len, error = %e, "skipping non-send traffic on queue");
                    }
                },
                // Empty queue: the normal end of a drain
                Err(Errno::EAGAIN) => break,
                Err(e) => {
                    error!(
                        queue = %self.name.to_string_lossy(),
                        error = %e,
                        partial = requests.len(),
                        "queue receive failed, returning partial batch"
                    );
                    return DrainedBatch {
                        requests,
                        error: Some(e.into()),
                    };
                }
            }
        }

        DrainedBatch {
            requests,
            error: None,
        }
    }

    /// Number of messages currently queued.
    pub fn depth(&self) -> Result<i64, QueueError> {
        Ok(mq_getattr(&self.mqd)?.curmsgs())
    }

    /// Close and unlink the queue. Called once at daemon shutdown.
    pub fn destroy(self) -> Result<(), QueueError> {
        mq_close(self.mqd)?;
        mq_unlink(self.name.as_c_str())?;
        debug!(queue = %self.name.to_string_lossy(), "message queue destroyed");
        Ok(())
    }

    /// Probe the queue depth for an endpoint without creating the queue.
    ///
    /// Returns `None` when no queue exists (no daemon has created one).
    pub fn probe_depth(endpoint_id: &str) -> Result<Option<i64>, QueueError> {
        let name = CString::new(queue_name(endpoint_id))?;
        let oflag = MQ_OFlag::O_RDONLY | MQ_OFlag::O_NONBLOCK;
        match mq_open(name.as_c_str(), oflag, Mode::empty(), None) {
            Ok(mqd) => {
                let depth = mq_getattr(&mqd)?.curmsgs();
                mq_close(mqd)?;
                Ok(Some(depth))
            }
            Err(Errno::ENOENT) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Producer side of the per-endpoint queue: enqueue access only.
pub struct QueueProducer {
    mqd: MqdT,
    msg_bytes: usize,
}

impl QueueProducer {
    /// Open the endpoint's queue for enqueuing, creating it if it does not
    /// exist yet so producer and daemon start order does not matter.
    pub fn open(endpoint_id: &str, settings: QueueSettings) -> Result<Self, QueueError> {
        let name = CString::new(queue_name(endpoint_id))?;
        let attr = MqAttr::new(0, settings.depth, settings.msg_bytes, 0);
        let oflag = MQ_OFlag::O_CREAT | MQ_OFlag::O_WRONLY | MQ_OFlag::O_NONBLOCK;
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;

        let mqd = mq_open(name.as_c_str(), oflag, mode, Some(&attr))?;
        let effective = mq_getattr(&mqd)?;
        Ok(Self {
            mqd,
            msg_bytes: effective.msgsize() as usize,
        })
    }

    /// Enqueue one send request.
    ///
    /// Fails with [`QueueError::Oversize`] when the serialized envelope does
    /// not fit the queue's message size, and with `EAGAIN` when the queue is
    /// full (the producer never blocks).
    pub fn enqueue(&self, request: &SendRequest) -> Result<(), QueueError> {
        let payload = QueueEnvelope::Send(request.clone()).encode()?;
        if payload.len() > self.msg_bytes {
            return Err(QueueError::Oversize {
                len: payload.len(),
                max: self.msg_bytes,
            });
        }
        mq_send(&self.mqd, &payload, 0)?;
        Ok(())
    }

    /// Close the producer handle.
    pub fn close(self) -> Result<(), QueueError> {
        mq_close(self.mqd)?;
        Ok(())
    }
}
