//! Inbound polling tests against the scriptable mock adapter and the
//! in-memory inbound store.

use pretty_assertions::assert_eq;
use smsgated_test_utils::fixtures::{MemoryInbox, MockAdapter};

use smsgated_core::inbound::poll_inbound;
use smsgated_core::message::InboundSms;

#[tokio::test]
async fn test_unsupported_adapter_is_never_read() {
    let mut adapter = MockAdapter::new().without_read_support();
    let store = MemoryInbox::new();

    let stored = poll_inbound(&mut adapter, &store, "ops", "gw1").await;

    assert_eq!(stored, 0);
    assert_eq!(adapter.read_calls(), 0);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn test_read_error_is_contained() {
    let mut adapter = MockAdapter::new().with_read_error("modem offline");
    let store = MemoryInbox::new();

    let stored = poll_inbound(&mut adapter, &store, "ops", "gw1").await;

    assert_eq!(stored, 0);
    assert_eq!(adapter.read_calls(), 1);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn test_messages_forwarded_with_identity() {
    let mut adapter = MockAdapter::new().with_read(vec![InboundSms::new("+100", "hi")]);
    let store = MemoryInbox::new();

    let stored = poll_inbound(&mut adapter, &store, "ops", "gw1").await;

    assert_eq!(stored, 1);
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user, "ops");
    assert_eq!(records[0].endpoint, "gw1");
    assert_eq!(records[0].origin, "+100");
    assert_eq!(records[0].text, "hi");
}

#[tokio::test]
async fn test_store_error_does_not_abort_batch() {
    let mut adapter = MockAdapter::new().with_read(vec![
        InboundSms::new("+1", "first"),
        InboundSms::new("+2", "second"),
        InboundSms::new("+3", "third"),
    ]);
    // Store fails on the second message only
    let store = MemoryInbox::new().failing_on("second");

    let stored = poll_inbound(&mut adapter, &store, "ops", "gw1").await;

    assert_eq!(stored, 2);
    let origins: Vec<String> = store.records().iter().map(|r| r.origin.clone()).collect();
    assert_eq!(origins, vec!["+1", "+3"]);
}

#[tokio::test]
async fn test_single_read_per_poll() {
    let mut adapter = MockAdapter::new().with_read(vec![InboundSms::new("+1", "a")]);
    let store = MemoryInbox::new();

    poll_inbound(&mut adapter, &store, "ops", "gw1").await;
    assert_eq!(adapter.read_calls(), 1);
}
