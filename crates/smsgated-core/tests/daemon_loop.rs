//! End-to-end daemon loop tests: real POSIX queue, real worker processes,
//! scriptable adapter, tempdir-backed storage.

use std::time::Duration;

use pretty_assertions::assert_eq;

use smsgated_core::daemon::Daemon;
use smsgated_core::dispatch::WorkerSpec;
use smsgated_core::inbound::JsonlInbox;
use smsgated_core::lock::EndpointLock;
use smsgated_core::message::{InboundSms, SendRequest};
use smsgated_core::queue::{MessageQueue, QueueProducer, QueueSettings};
use smsgated_core::DaemonState;
use smsgated_test_utils::config::TestEnv;
use smsgated_test_utils::fixtures::MockAdapter;
use smsgated_test_utils::tracing_setup::init_test_tracing;

/// Worker script that appends its payload (argv: `worker --endpoint <id>
/// --payload <json>`, so `$4`) to a log file, then exits per the payload.
fn logging_worker(log_path: &std::path::Path) -> WorkerSpec {
    let script = format!(
        r#"echo "$4" >> {log}; case "$4" in *bad*) exit 1;; *) exit 0;; esac"#,
        log = log_path.display()
    );
    WorkerSpec::new(
        "/bin/sh",
        vec!["-c".to_string(), script, "worker".to_string()],
    )
}

fn producer_for(env: &TestEnv) -> QueueProducer {
    QueueProducer::open(
        &env.config.endpoint.id,
        QueueSettings {
            depth: env.config.daemon.queue_depth,
            msg_bytes: env.config.daemon.queue_msg_bytes,
        },
    )
    .expect("open producer")
}

#[tokio::test]
async fn test_enqueued_sends_reach_worker_processes() {
    init_test_tracing();
    let env = TestEnv::new("e2e-send").watchdog_secs(60);
    let log_path = env.inbox_path().with_file_name("delivered.log");

    let producer = producer_for(&env);
    producer.enqueue(&SendRequest::new("+1", "first")).unwrap();
    producer.enqueue(&SendRequest::new("+2", "bad news")).unwrap();
    producer.enqueue(&SendRequest::new("+3", "third")).unwrap();
    producer.close().unwrap();

    let mut daemon = Daemon::new(
        env.config.clone(),
        Box::new(MockAdapter::new().without_read_support()),
        Box::new(JsonlInbox::new(&env.config.storage.inbox_path)),
        logging_worker(&log_path),
    );
    let handle = daemon.shutdown_handle();
    let task = tokio::spawn(async move {
        daemon.run().await.unwrap();
        daemon
    });

    // Let the daemon drain and dispatch, then stop it
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.shutdown();
    let daemon = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("daemon did not stop")
        .unwrap();
    assert_eq!(daemon.state(), DaemonState::Stopped);

    // Each request was handed to its own worker, failures included
    let log = std::fs::read_to_string(&log_path).expect("worker log");
    let payloads: Vec<SendRequest> = log
        .lines()
        .map(|l| serde_json::from_str(l).expect("payload json"))
        .collect();
    assert_eq!(payloads.len(), 3);
    let mut tos: Vec<&str> = payloads.iter().map(|r| r.to.as_str()).collect();
    tos.sort();
    assert_eq!(tos, vec!["+1", "+2", "+3"]);

    // Shutdown destroyed the queue and released the endpoint lock
    assert!(
        MessageQueue::probe_depth(&env.config.endpoint.id)
            .unwrap()
            .is_none()
    );
    assert_eq!(
        EndpointLock::holder_pid(
            std::path::Path::new(&env.config.daemon.lock_dir),
            &env.config.endpoint.id,
        )
        .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_inbound_message_is_persisted_once() {
    init_test_tracing();
    let env = TestEnv::new("e2e-inbound").watchdog_secs(60);

    let adapter = MockAdapter::new().with_read(vec![InboundSms::new("+100", "hi")]);
    let mut daemon = Daemon::new(
        env.config.clone(),
        Box::new(adapter),
        Box::new(JsonlInbox::new(&env.config.storage.inbox_path)),
        WorkerSpec::new("/bin/true", Vec::new()),
    );
    let handle = daemon.shutdown_handle();
    let task = tokio::spawn(async move { daemon.run().await.unwrap() });

    // Several iterations pass; the scripted batch is consumed by the first
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("daemon did not stop")
        .unwrap();

    let contents = std::fs::read_to_string(env.inbox_path()).expect("inbox file");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["text"], "hi");
    assert_eq!(record["origin"], "+100");
    assert_eq!(record["user"], "tester");
    assert_eq!(record["endpoint"], env.config.endpoint.id.as_str());
}

#[tokio::test]
async fn test_idle_daemon_stops_itself_and_cleans_up() {
    init_test_tracing();
    let env = TestEnv::new("e2e-idle").watchdog_secs(1);

    let mut daemon = Daemon::new(
        env.config.clone(),
        Box::new(MockAdapter::new().without_read_support()),
        Box::new(JsonlInbox::new(&env.config.storage.inbox_path)),
        WorkerSpec::new("/bin/true", Vec::new()),
    );
    let task = tokio::spawn(async move {
        daemon.run().await.unwrap();
        daemon
    });

    // No traffic at all: the watchdog must bring the daemon down by itself
    let daemon = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("watchdog did not stop the daemon")
        .unwrap();
    assert_eq!(daemon.state(), DaemonState::Stopped);

    assert!(
        MessageQueue::probe_depth(&env.config.endpoint.id)
            .unwrap()
            .is_none()
    );
    assert_eq!(
        EndpointLock::holder_pid(
            std::path::Path::new(&env.config.daemon.lock_dir),
            &env.config.endpoint.id,
        )
        .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_traffic_defers_watchdog_expiry() {
    init_test_tracing();
    let env = TestEnv::new("e2e-defer").watchdog_secs(3);
    let log_path = env.inbox_path().with_file_name("delivered.log");

    let mut daemon = Daemon::new(
        env.config.clone(),
        Box::new(MockAdapter::new().without_read_support()),
        Box::new(JsonlInbox::new(&env.config.storage.inbox_path)),
        logging_worker(&log_path),
    );
    let task = tokio::spawn(async move {
        daemon.run().await.unwrap();
        daemon
    });

    // Enqueue well before the original deadline; the drain must reset it
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let producer = producer_for(&env);
    producer.enqueue(&SendRequest::new("+7", "late")).unwrap();
    producer.close().unwrap();

    // The daemon still winds down on its own once idle again
    let daemon = tokio::time::timeout(Duration::from_secs(15), task)
        .await
        .expect("watchdog did not stop the daemon")
        .unwrap();
    assert_eq!(daemon.state(), DaemonState::Stopped);

    // The late message was processed before termination
    let log = std::fs::read_to_string(&log_path).expect("worker log");
    assert_eq!(log.lines().count(), 1);
    let payload: SendRequest = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(payload.to, "+7");
}
