//! End-to-end two-process integration test for the shared memory queue.
//!
//! The same test executable is re-invoked with role environment variables to
//! act as the publishing and the subscribing process, so the test exercises
//! the real cross-process path: a mapped region created by one process and
//! attached by another, CAS coordination between unrelated address spaces,
//! and the domain socket wake-up signal (including its loss at publisher
//! exit, after which the subscriber finishes on the timer fallback).
//!
//! ```text
//!                    Time -->
//!
//! [Publisher] --[create]--[enqueue 0..N]--[exit, unlink]
//!                  |           |  |  |
//!                  v           v  v  v
//!              [mmap file]  (concurrent dequeues)
//!                  |           ^  ^  ^
//!                  v           |  |  |
//! [Subscriber] ---[attach]--[dequeue until N received]--[verify FIFO]
//! ```

use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Writes to stderr with immediate flush to bypass test output capture.
macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "BASALT_E2E_ROLE";
const ENV_PATH: &str = "BASALT_E2E_PATH";
const ROLE_PUBLISHER: &str = "publisher";
const ROLE_SUBSCRIBER: &str = "subscriber";

const QUEUE_NAME: &str = "e2e";
const MESSAGE_COUNT: u64 = 10_000;

/// Small enough that the ring fills and wraps thousands of times, forcing
/// the publisher through its full-queue back-off.
const CAPACITY: usize = 4096;

fn test_root() -> String {
    format!("/tmp/basalt_e2e_{}", std::process::id())
}

fn options(root: &str) -> basalt_queue::QueueOptions {
    basalt_queue::QueueOptions::new(QUEUE_NAME, root, CAPACITY)
}

fn run_publisher(root: &str) {
    use basalt_queue::{CancellationToken, Publisher};

    log!("[PUBLISHER] Creating queue under {root} (cap={CAPACITY})");
    let mut publisher = Publisher::create(options(root)).expect("publisher: failed to create queue");
    let token = CancellationToken::default();

    let start = Instant::now();
    for i in 0..MESSAGE_COUNT {
        publisher
            .enqueue(&i.to_le_bytes(), &token)
            .expect("publisher: enqueue failed");
        if (i + 1) % 2_500 == 0 {
            log!("[PUBLISHER] Progress: {}/{MESSAGE_COUNT}", i + 1);
        }
    }

    let elapsed = start.elapsed();
    let rate = MESSAGE_COUNT as f64 / elapsed.as_secs_f64();
    log!("[PUBLISHER] Done: {MESSAGE_COUNT} messages in {elapsed:?} ({rate:.0} msg/s)");
    // Exiting drops the publisher: the backing file is unlinked and the
    // signal server disappears while the subscriber may still be draining.
}

fn run_subscriber(root: &str) {
    use basalt_queue::{CancellationToken, Subscriber};

    log!("[SUBSCRIBER] Attaching to queue under {root}");
    // The publisher may not have created the region yet; retry briefly.
    let attach_deadline = Instant::now() + Duration::from_secs(5);
    let mut subscriber = loop {
        match Subscriber::create(options(root)) {
            Ok(s) => break s,
            Err(_) if Instant::now() < attach_deadline => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => panic!("[SUBSCRIBER] Failed to attach: {e}"),
        }
    };
    log!("[SUBSCRIBER] Attached, draining...");

    let token = CancellationToken::default();
    let deadline = Instant::now() + Duration::from_secs(30);
    let start = Instant::now();
    let mut body = Vec::new();
    let mut received: u64 = 0;

    while received < MESSAGE_COUNT {
        assert!(
            Instant::now() < deadline,
            "[SUBSCRIBER] Timed out after {received}/{MESSAGE_COUNT} messages"
        );
        if subscriber
            .try_dequeue_into(&mut body, &token)
            .expect("subscriber: dequeue failed")
        {
            let seq = u64::from_le_bytes(body.as_slice().try_into().expect("8-byte body"));
            assert_eq!(seq, received, "FIFO order violated");
            received += 1;
        } else {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let elapsed = start.elapsed();
    let rate = received as f64 / elapsed.as_secs_f64();
    log!("[SUBSCRIBER] Done: {received} messages in {elapsed:?} ({rate:.0} msg/s)");
}

/// Two-process concurrent end-to-end test.
///
/// Validates that a queue created in one process and attached from another
/// delivers every message exactly once and in order while both run
/// simultaneously, and that the subscriber survives the publisher's exit
/// (unlinked backing file, lost signal server).
#[test]
fn e2e_two_process_queue() {
    if let Ok(role) = env::var(ENV_ROLE) {
        let root = env::var(ENV_PATH).expect("BASALT_E2E_PATH not set");
        match role.as_str() {
            ROLE_PUBLISHER => run_publisher(&root),
            ROLE_SUBSCRIBER => run_subscriber(&root),
            other => panic!("Unknown role: {other}"),
        }
        return;
    }

    let root = test_root();
    let exe = env::current_exe().expect("Failed to get current executable path");

    log!("");
    log!("E2E Two-Process Queue Test");
    log!("Root: {root}, messages: {MESSAGE_COUNT}, capacity: {CAPACITY}");

    let mut publisher_proc = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_queue")
        .env(ENV_ROLE, ROLE_PUBLISHER)
        .env(ENV_PATH, &root)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("Failed to spawn publisher process");

    // Just enough delay for the region to exist; the subscriber retries
    // attachment anyway.
    std::thread::sleep(Duration::from_millis(5));

    let mut subscriber_proc = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_queue")
        .env(ENV_ROLE, ROLE_SUBSCRIBER)
        .env(ENV_PATH, &root)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("Failed to spawn subscriber process");

    let publisher_status = publisher_proc.wait().expect("Failed to wait for publisher");
    let subscriber_status = subscriber_proc.wait().expect("Failed to wait for subscriber");

    let _ = std::fs::remove_dir_all(&root);

    assert!(
        publisher_status.success(),
        "Publisher process failed with status: {publisher_status}"
    );
    assert!(
        subscriber_status.success(),
        "Subscriber process failed with status: {subscriber_status}"
    );

    log!("[ORCHESTRATOR] Two-process test passed");
}
