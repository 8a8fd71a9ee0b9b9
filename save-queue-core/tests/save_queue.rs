// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use prometheus::Registry;
use save_queue_config::Parameters;
use save_queue_core::{AppendRequest, MemStore, MemberId, RoleNotifier, SaveQueue};
use tracing_subscriber::EnvFilter;

/// Surfaces this crate's `tracing` output (gated behind `tracing.storage` at
/// the call sites, unconditional for warnings) when a test is run with
/// `RUST_LOG` set. A no-op subscriber is installed otherwise; `try_init`
/// tolerates being called from more than one test in the same binary.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .try_init();
}

struct CountingNotifier {
    updates: std::sync::atomic::AtomicUsize,
    errors: AtomicBool,
}

impl CountingNotifier {
    fn new() -> Self {
        Self {
            updates: std::sync::atomic::AtomicUsize::new(0),
            errors: AtomicBool::new(false),
        }
    }
}

impl RoleNotifier for CountingNotifier {
    fn index_updated(&self, is_error: bool, _deleted: bool) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if is_error {
            self.errors.store(true, Ordering::SeqCst);
        }
    }
}

fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn appends_drain_through_workers_to_a_contiguous_tip() {
    init_tracing();
    let store: Arc<MemStore> = Arc::new(MemStore::new());
    let notifier = Arc::new(CountingNotifier::new());
    let registry = Registry::new();
    let mut parameters = Parameters::default();
    parameters.save_queue_workers = 3;
    parameters.tracing_storage = true;

    let mut queue = SaveQueue::start(
        MemberId(1),
        parameters,
        store.clone(),
        notifier.clone(),
        &registry,
        "pid-test",
        "addr-test",
    )
    .unwrap();

    for i in 0..20u64 {
        queue.enqueue(AppendRequest::new(i, 1, Bytes::from_static(b"x")));
    }

    let reached_tip = wait_until(
        || queue.get_latest().map(|rid| rid.index).unwrap_or(0) == 20,
        Duration::from_secs(5),
    );
    assert!(reached_tip, "workers never reached index 20");
    assert!(!notifier.errors.load(Ordering::SeqCst));

    queue.stop();
}

#[test]
fn settle_quiesces_and_returns_the_reconciled_tip() {
    init_tracing();
    let store: Arc<MemStore> = Arc::new(MemStore::new());
    let notifier = Arc::new(CountingNotifier::new());
    let registry = Registry::new();
    let mut parameters = Parameters::default();
    parameters.save_queue_workers = 2;

    let mut queue = SaveQueue::start(
        MemberId(2),
        parameters,
        store.clone(),
        notifier,
        &registry,
        "pid-test",
        "addr-test",
    )
    .unwrap();

    for i in 0..10u64 {
        queue.enqueue(AppendRequest::new(i, 1, Bytes::from_static(b"x")));
    }

    // Let the workers actually drain before settling, so settle observes a
    // genuinely idle queue instead of racing its own drain-and-discard.
    let drained = wait_until(
        || queue.get_latest().map(|rid| rid.index).unwrap_or(0) == 10,
        Duration::from_secs(5),
    );
    assert!(drained, "workers never reached index 10");

    let rid = queue.settle().unwrap();
    assert_eq!(rid.index, 10);
    assert_eq!(queue.size(), 0);

    queue.stop();
}

#[test]
fn truncate_resets_to_zero_and_empties_storage() {
    init_tracing();
    let store: Arc<MemStore> = Arc::new(MemStore::new());
    let notifier = Arc::new(CountingNotifier::new());
    let registry = Registry::new();
    let parameters = Parameters::default();

    let mut queue = SaveQueue::start(
        MemberId(3),
        parameters,
        store.clone(),
        notifier,
        &registry,
        "pid-test",
        "addr-test",
    )
    .unwrap();

    for i in 0..5u64 {
        queue.enqueue(AppendRequest::new(i, 1, Bytes::from_static(b"x")));
    }
    queue.settle().unwrap();

    let rid = queue.truncate().unwrap();
    assert_eq!(rid.index, 0);
    assert_eq!(rid.term, 0);
    assert_eq!(store.count(MemberId(3)).unwrap(), 0);

    queue.stop();
}

#[test]
fn restart_reconciles_from_storage_alone() {
    init_tracing();
    let store: Arc<MemStore> = Arc::new(MemStore::new());
    let registry = Registry::new();

    {
        let notifier = Arc::new(CountingNotifier::new());
        let mut queue = SaveQueue::start(
            MemberId(4),
            Parameters::default(),
            store.clone(),
            notifier,
            &registry,
            "pid-a",
            "addr-a",
        )
        .unwrap();
        for i in 0..7u64 {
            queue.enqueue(AppendRequest::new(i, 1, Bytes::from_static(b"x")));
        }
        let drained = wait_until(
            || queue.get_latest().map(|rid| rid.index).unwrap_or(0) == 7,
            Duration::from_secs(5),
        );
        assert!(drained, "workers never reached index 7");
        queue.settle().unwrap();
        queue.stop();
    }

    // A second instance over the same storage, simulating a restart after a
    // crash, must reconcile to the same tip without replaying any requests.
    let notifier = Arc::new(CountingNotifier::new());
    let queue = SaveQueue::start(
        MemberId(4),
        Parameters::default(),
        store.clone(),
        notifier,
        &registry,
        "pid-b",
        "addr-b",
    )
    .unwrap();

    assert_eq!(queue.get_latest().unwrap().index, 7);
}
