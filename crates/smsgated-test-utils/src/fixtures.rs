//! Mock adapter and in-memory inbound store.
//!
//! [`MockAdapter`] lets tests script adapter read results; [`MemoryInbox`]
//! records persisted inbound messages and can be told to reject specific
//! ones to exercise partial-failure paths.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use smsgated_core::adapter::{AdapterError, DeviceAdapter};
use smsgated_core::inbound::{InboundStore, StoreError};
use smsgated_core::message::{InboundSms, SendRequest};
use smsgated_core::BoxFuture;

/// Scriptable device adapter for tests.
///
/// Each queued read result is consumed by one `read()` call; once the queue
/// is exhausted, reads return an empty batch.
#[derive(Debug)]
pub struct MockAdapter {
    supports_read: bool,
    reads: Mutex<VecDeque<Result<Vec<InboundSms>, AdapterError>>>,
    read_calls: AtomicUsize,
    sent: Mutex<Vec<SendRequest>>,
}

impl MockAdapter {
    /// An adapter that supports reads and returns empty batches.
    pub fn new() -> Self {
        Self {
            supports_read: true,
            reads: Mutex::new(VecDeque::new()),
            read_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Builder: declare no inbound read support.
    pub fn without_read_support(mut self) -> Self {
        self.supports_read = false;
        self
    }

    /// Builder: queue one successful read returning the given batch.
    pub fn with_read(self, batch: Vec<InboundSms>) -> Self {
        self.reads
            .lock()
            .expect("mock reads lock")
            .push_back(Ok(batch));
        self
    }

    /// Builder: queue one failing read.
    pub fn with_read_error(self, message: &str) -> Self {
        self.reads
            .lock()
            .expect("mock reads lock")
            .push_back(Err(AdapterError::Protocol(message.to_string())));
        self
    }

    /// Number of `read()` calls observed.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Requests passed to `send()`.
    pub fn sent(&self) -> Vec<SendRequest> {
        self.sent.lock().expect("mock sent lock").clone()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceAdapter for MockAdapter {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn supports_read(&self) -> bool {
        self.supports_read
    }

    fn read(&mut self) -> BoxFuture<'_, Result<Vec<InboundSms>, AdapterError>> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        let next = self
            .reads
            .lock()
            .expect("mock reads lock")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { next })
    }

    fn send<'a>(
        &'a mut self,
        request: &'a SendRequest,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        self.sent
            .lock()
            .expect("mock sent lock")
            .push(request.clone());
        Box::pin(async { Ok(()) })
    }
}

/// One message recorded by [`MemoryInbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSms {
    pub user: String,
    pub endpoint: String,
    pub text: String,
    pub origin: String,
}

/// In-memory inbound store for tests.
pub struct MemoryInbox {
    records: Mutex<Vec<StoredSms>>,
    fail_on_text: Option<String>,
}

impl MemoryInbox {
    /// A store accepting everything.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_on_text: None,
        }
    }

    /// Builder: reject messages whose text contains the given substring.
    pub fn failing_on(mut self, text_substring: &str) -> Self {
        self.fail_on_text = Some(text_substring.to_string());
        self
    }

    /// All records persisted so far.
    pub fn records(&self) -> Vec<StoredSms> {
        self.records.lock().expect("inbox records lock").clone()
    }
}

impl Default for MemoryInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundStore for MemoryInbox {
    fn receive<'a>(
        &'a self,
        user: &'a str,
        endpoint: &'a str,
        text: &'a str,
        origin: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if let Some(needle) = &self.fail_on_text
                && text.contains(needle.as_str())
            {
                return Err(StoreError::Rejected(format!(
                    "test store rejecting text containing {needle:?}"
                )));
            }
            self.records.lock().expect("inbox records lock").push(StoredSms {
                user: user.to_string(),
                endpoint: endpoint.to_string(),
                text: text.to_string(),
                origin: origin.to_string(),
            });
            Ok(())
        })
    }
}
