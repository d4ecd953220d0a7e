//! HTTP gateway adapter.
//!
//! Sends each outbound request as a JSON POST to a configured gateway URL;
//! inbound reads GET an optional inbox URL expected to return a JSON array
//! of [`InboundSms`]. Covers the common case of carrier or aggregator HTTP
//! APIs without binding to any one vendor's schema beyond this shape.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use smsgated_core::BoxFuture;
use smsgated_core::adapter::{AdapterError, DeviceAdapter};
use smsgated_core::message::{InboundSms, SendRequest};

/// Adapter type selector for the registry.
pub const KIND: &str = "http";

/// Request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-over-HTTP device adapter.
#[derive(Debug)]
pub struct HttpAdapter {
    client: reqwest::Client,
    send_url: String,
    inbox_url: Option<String>,
    token: Option<String>,
}

impl HttpAdapter {
    /// Build from endpoint params.
    ///
    /// Required: `send_url`. Optional: `inbox_url` (enables inbound reads),
    /// `token` (sent as a bearer token on every call).
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AdapterError> {
        let send_url = params
            .get("send_url")
            .ok_or_else(|| {
                AdapterError::Config("http adapter requires a 'send_url' param".into())
            })?
            .clone();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;

        Ok(Self {
            client,
            send_url,
            inbox_url: params.get("inbox_url").cloned(),
            token: params.get("token").cloned(),
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

impl DeviceAdapter for HttpAdapter {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn supports_read(&self) -> bool {
        self.inbox_url.is_some()
    }

    fn read(&mut self) -> BoxFuture<'_, Result<Vec<InboundSms>, AdapterError>> {
        Box::pin(async move {
            let url = self
                .inbox_url
                .as_deref()
                .ok_or(AdapterError::ReadUnsupported)?;

            let response = self
                .authed(self.client.get(url))
                .send()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?
                .error_for_status()
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;

            let batch: Vec<InboundSms> = response
                .json()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;
            debug!(url, count = batch.len(), "inbox fetched");
            Ok(batch)
        })
    }

    fn send<'a>(
        &'a mut self,
        request: &'a SendRequest,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            self.authed(self.client.post(&self.send_url))
                .json(request)
                .send()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?
                .error_for_status()
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;

            debug!(to = %request.to, url = %self.send_url, "send accepted by gateway");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_send_url_is_config_error() {
        let err = HttpAdapter::from_params(&HashMap::new()).unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[test]
    fn test_read_capability_follows_inbox_url() {
        let without = HttpAdapter::from_params(&params(&[(
            "send_url",
            "https://sms.example.com/send",
        )]))
        .unwrap();
        assert!(!without.supports_read());

        let with = HttpAdapter::from_params(&params(&[
            ("send_url", "https://sms.example.com/send"),
            ("inbox_url", "https://sms.example.com/inbox"),
        ]))
        .unwrap();
        assert!(with.supports_read());
    }

    #[tokio::test]
    async fn test_read_without_inbox_url_reports_unsupported() {
        let mut adapter = HttpAdapter::from_params(&params(&[(
            "send_url",
            "https://sms.example.com/send",
        )]))
        .unwrap();

        assert!(matches!(
            adapter.read().await,
            Err(AdapterError::ReadUnsupported)
        ));
    }

    #[tokio::test]
    async fn test_send_to_unreachable_gateway_is_protocol_error() {
        // Grab a free local port and release it: connecting is then refused
        // immediately, no network needed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut adapter = HttpAdapter::from_params(&params(&[(
            "send_url",
            &format!("http://127.0.0.1:{port}/send"),
        )]))
        .unwrap();

        let err = adapter
            .send(&SendRequest::new("+1", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Protocol(_)));
    }
}
