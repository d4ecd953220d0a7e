#![deny(unsafe_code)]

//! Device adapter implementations for smsgated.
//!
//! Adapters implement the capability contract defined in
//! `smsgated_core::adapter`; which one an endpoint uses is selected by the
//! `endpoint.adapter` configuration field through [`build`].
//!
//! Two reference adapters are provided:
//! - `spool` — directory spool for development and tests: sends become JSON
//!   files in an outbox directory, inbound messages are consumed from an
//!   inbox directory.
//! - `http` — JSON-over-HTTP gateway: sends POST to a configured URL,
//!   inbound reads GET an optional inbox URL.

use smsgated_config::EndpointConfig;
use smsgated_core::adapter::{AdapterError, DeviceAdapter};

pub mod http;
pub mod spool;

pub use http::HttpAdapter;
pub use spool::SpoolAdapter;

/// Instantiate the adapter an endpoint is configured for.
///
/// Unknown adapter types are a construction error; the daemon refuses to
/// start rather than running without a device.
pub fn build(endpoint: &EndpointConfig) -> Result<Box<dyn DeviceAdapter>, AdapterError> {
    match endpoint.adapter.as_str() {
        spool::KIND => Ok(Box::new(SpoolAdapter::from_params(&endpoint.params)?)),
        http::KIND => Ok(Box::new(HttpAdapter::from_params(&endpoint.params)?)),
        other => Err(AdapterError::Config(format!(
            "unknown adapter type {other:?} (known: {}, {})",
            spool::KIND,
            http::KIND
        ))),
    }
}
