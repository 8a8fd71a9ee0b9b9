// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use prometheus::Registry;
use save_queue_config::Parameters;

use crate::commit_tracker::CommitTracker;
use crate::context::{Context, MemberId};
use crate::delete_range::delete_range;
use crate::entry::{AppendRequest, Rid, RoleNotifier};
use crate::error::SaveQueueResult;
use crate::reconciler::init_saved_index;
use crate::storage::Store;
use crate::worker::WorkerPool;

/// Owns the persistence pipeline for a single Raft log member: a bounded
/// pool of workers draining append requests against `storage`, and the
/// commit tracker they all serialize through.
///
/// Construct one per member via `start`; `stop` joins the workers and must
/// be called before the instance is dropped if a clean shutdown matters.
pub struct SaveQueue {
    tracker: Arc<CommitTracker>,
    store: Arc<dyn Store>,
    context: Arc<Context>,
    notifier: Arc<dyn RoleNotifier>,
    owner_pid: String,
    owner_address: String,
    workers: Option<WorkerPool>,
}

impl SaveQueue {
    /// Brings up a save queue for `member_id`: runs the reconciler once to
    /// establish the initial `saved_index`, then starts the worker pool.
    /// `owner_pid`/`owner_address` identify this process to storage so a
    /// later restart can detect a stale prior owner.
    pub fn start(
        member_id: MemberId,
        parameters: Parameters,
        store: Arc<dyn Store>,
        notifier: Arc<dyn RoleNotifier>,
        registry: &Registry,
        owner_pid: &str,
        owner_address: &str,
    ) -> SaveQueueResult<Self> {
        let num_workers = parameters.save_queue_workers;
        let context = Arc::new(Context::new(member_id, parameters, registry));
        let tracker = Arc::new(CommitTracker::new(num_workers));

        init_saved_index(&tracker, store.as_ref(), &context, owner_pid, owner_address)?;

        let workers = WorkerPool::start(
            num_workers,
            tracker.clone(),
            store.clone(),
            context.clone(),
            notifier.clone(),
        );

        Ok(Self {
            tracker,
            store,
            context,
            notifier,
            owner_pid: owner_pid.to_string(),
            owner_address: owner_address.to_string(),
            workers: Some(workers),
        })
    }

    /// Enqueues an append request for a worker to process. Returns
    /// immediately; completion is observed via `get_latest`/`get_latest_wait`
    /// or the `RoleNotifier` callback.
    pub fn enqueue(&self, request: AppendRequest) {
        self.context.metrics.requests_enqueued.inc();
        self.tracker.enqueue(request);
        self.context
            .metrics
            .queue_depth
            .set(self.tracker.size() as i64);
    }

    /// Current depth of the pending-request queue.
    pub fn size(&self) -> usize {
        self.tracker.size()
    }

    /// Snapshot of `(last_term, saved_index)`. Fails if `start` has not yet
    /// completed its initial reconciliation.
    pub fn get_latest(&self) -> SaveQueueResult<Rid> {
        self.tracker.get_latest()
    }

    /// Same as `get_latest`, but blocks until the initial reconciliation has
    /// completed instead of failing.
    pub fn get_latest_wait(&self) -> Rid {
        self.tracker.get_latest_wait()
    }

    /// Quiesces every worker, then re-runs the reconciler. Used on a role
    /// transition where the caller needs a definitive `(last_term,
    /// saved_index)` with no writes racing in the background.
    pub fn settle(&self) -> SaveQueueResult<Rid> {
        self.tracker.drain_and_quiesce();
        init_saved_index(
            &self.tracker,
            self.store.as_ref(),
            &self.context,
            &self.owner_pid,
            &self.owner_address,
        )?;
        self.tracker.get_latest()
    }

    /// Discards the entire log for this member and settles back to
    /// `(0, 0)`. Used when a member is being reset, e.g. before joining a
    /// different configuration from scratch.
    pub fn truncate(&self) -> SaveQueueResult<Rid> {
        self.tracker.drain_and_quiesce();

        let member_id = self.context.member_id;
        let last_index = self
            .store
            .get_last(member_id)?
            .map(|e| e.index)
            .unwrap_or(0);
        if last_index > 0 {
            let deleted = delete_range(self.store.as_ref(), member_id, 0, 1, last_index as i64)?;
            self.context.metrics.entries_deleted.inc_by(deleted);
        }

        let rid = self.settle()?;
        debug_assert_eq!(rid, Rid::default());
        self.notifier.index_updated(false, true);
        Ok(rid)
    }

    /// Signals every worker to exit and joins them. Safe to call once;
    /// further `enqueue` calls after this will sit in the queue forever
    /// since no worker remains to drain it.
    pub fn stop(&mut self) {
        self.tracker.shutdown();
        if let Some(workers) = self.workers.take() {
            workers.join();
        }
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        self.stop();
    }
}
