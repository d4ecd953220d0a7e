//! Device adapter contract.
//!
//! An adapter is the pluggable driver for one device/protocol type. The
//! daemon only depends on this capability contract: whether the adapter
//! supports inbound reads, and the read operation itself. The send operation
//! is invoked exclusively inside the worker process, never by the daemon's
//! control loop.
//!
//! Concrete implementations live in the `smsgated-adapters` crate and are
//! selected by the `endpoint.adapter` configuration field.

use crate::BoxFuture;
use crate::message::{InboundSms, SendRequest};

/// Errors from device adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("adapter configuration error: {0}")]
    Config(String),

    #[error("adapter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("adapter protocol error: {0}")]
    Protocol(String),

    #[error("adapter does not support inbound reads")]
    ReadUnsupported,
}

/// Capability contract for a device adapter bound to one endpoint.
///
/// The adapter instance is exclusively owned by its caller and never shared:
/// the daemon's control loop is the only reader, and each worker process
/// constructs its own instance for the single send it performs.
pub trait DeviceAdapter: Send + std::fmt::Debug {
    /// The adapter type selector this instance was built from (e.g. "spool").
    fn kind(&self) -> &'static str;

    /// Whether this adapter can fetch inbound messages.
    ///
    /// When `false`, the daemon never calls [`read`](Self::read).
    fn supports_read(&self) -> bool;

    /// Fetch a batch of inbound messages.
    ///
    /// Called at most once per daemon iteration; a single call returns zero
    /// or more messages. Implementations that do not support reads should
    /// return [`AdapterError::ReadUnsupported`].
    fn read(&mut self) -> BoxFuture<'_, Result<Vec<InboundSms>, AdapterError>>;

    /// Deliver one outbound request.
    ///
    /// Only invoked from within a worker process; the process exit status is
    /// the delivery outcome signal.
    fn send<'a>(&'a mut self, request: &'a SendRequest)
    -> BoxFuture<'a, Result<(), AdapterError>>;
}
