// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::thread;

use tracing::{trace, warn};

use crate::append;
use crate::commit_tracker::CommitTracker;
use crate::context::Context;
use crate::entry::RoleNotifier;
use crate::error::SaveQueueError;
use crate::storage::Store;

/// A fixed-size pool of OS threads draining the append-request queue in
/// parallel. Each worker loops: block for a request, process it via the
/// append handler, release it, repeat. A worker only exits once the
/// tracker is shut down.
pub(crate) struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn start(
        num_workers: u32,
        tracker: Arc<CommitTracker>,
        store: Arc<dyn Store>,
        context: Arc<Context>,
        notifier: Arc<dyn RoleNotifier>,
    ) -> Self {
        let handles = (0..num_workers)
            .map(|id| {
                let tracker = tracker.clone();
                let store = store.clone();
                let context = context.clone();
                let notifier = notifier.clone();
                thread::Builder::new()
                    .name(format!("save-queue-worker-{id}"))
                    .spawn(move || run(tracker, store, context, notifier))
                    .expect("failed to spawn save queue worker")
            })
            .collect();
        Self { handles }
    }

    pub(crate) fn join(self) {
        for handle in self.handles {
            handle.join().ok();
        }
    }
}

fn run(
    tracker: Arc<CommitTracker>,
    store: Arc<dyn Store>,
    context: Arc<Context>,
    notifier: Arc<dyn RoleNotifier>,
) {
    while let Some(request) = tracker.next_request() {
        context.metrics.requests_dequeued.inc();
        if context.tracing_storage.get() {
            trace!(
                member = %context.member_id,
                index = request.target_index(),
                "worker dequeued append request",
            );
        }
        match append::handle(&tracker, store.as_ref(), &context, notifier.as_ref(), request) {
            Ok(()) => {}
            Err(SaveQueueError::Cancelled) => break,
            Err(err) => {
                warn!(member = %context.member_id, error = %err, "append failed, continuing");
                context.metrics.storage_errors.inc();
                notifier.index_updated(true, false);
            }
        }
    }
}
