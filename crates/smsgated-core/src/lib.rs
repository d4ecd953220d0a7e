#![deny(unsafe_code)]

//! smsgated core daemon runtime.
//!
//! One daemon instance manages one messaging endpoint ("phone"): it drains
//! outbound send requests from a per-endpoint POSIX message queue, dispatches
//! each request to an isolated worker process, polls the endpoint's device
//! adapter for inbound messages, and terminates itself after a period of
//! inactivity. The CLI crate wires a concrete adapter and inbound store into
//! the [`Daemon`] and runs it.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future — the standard return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits (stable since Rust 1.75) produces opaque return
/// types that are **not** object-safe. Traits consumed via `Box<dyn Trait>` or
/// `&dyn Trait` must return a concrete `Pin<Box<dyn Future>>` instead. This
/// alias keeps those signatures readable.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Device adapter contract: send capability plus optional inbound reads.
pub mod adapter;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Daemon lifecycle controller and control loop.
pub mod daemon;
/// Dispatch supervisor — one isolated worker process per outbound request.
pub mod dispatch;
/// Inbound ingestion: capability gate, adapter polling, persistence.
pub mod inbound;
/// Per-endpoint uniqueness lock.
pub mod lock;
/// Outbound request and inbound message types, queue envelope encoding.
pub mod message;
/// Per-endpoint POSIX message queue: consumer drain and producer enqueue.
pub mod queue;
/// Inactivity watchdog.
pub mod watchdog;

pub use adapter::{AdapterError, DeviceAdapter};
pub use daemon::{Daemon, DaemonState, ShutdownHandle};
pub use dispatch::{DispatchOutcome, DispatchStatus, Dispatcher, WorkerSpec};
pub use inbound::{InboundStore, JsonlInbox, StoreError};
pub use lock::EndpointLock;
pub use message::{InboundSms, QueueEnvelope, SendRequest};
pub use queue::{DrainedBatch, MessageQueue, QueueError, QueueProducer, QueueSettings};
pub use watchdog::Watchdog;
