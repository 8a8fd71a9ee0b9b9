// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, warn};

use crate::commit_tracker::CommitTracker;
use crate::context::Context;
use crate::delete_range::delete_range;
use crate::error::{SaveQueueError, SaveQueueResult};
use crate::storage::Store;

/// Scans storage to establish the largest contiguous prefix and commits
/// it as the new `saved_index`. Called with workers already quiesced, by
/// `SaveQueue::start` and by `settle`.
///
/// Must run with the commit tracker's mutex held; the caller (`settle` or
/// `SaveQueue::start`) is responsible for quiescing workers first so that
/// no contention is possible while this runs.
pub(crate) fn init_saved_index(
    tracker: &CommitTracker,
    store: &dyn Store,
    context: &Context,
    owner_pid: &str,
    owner_address: &str,
) -> SaveQueueResult<()> {
    let _timer = context.metrics.reconcile_latency.start_timer();
    let member_id = context.member_id;

    let last_index = store.get_last(member_id)?.map(|e| e.index).unwrap_or(0);

    if let Some(existing_owner) = store.get_owner_pid(member_id)? {
        if existing_owner != owner_pid {
            warn!(
                member = %member_id,
                existing_owner,
                "storage for this member was last owned by a different process",
            );
        }
    }
    store.set_owner_pid(member_id, owner_pid)?;
    store.set_owner_address(member_id, owner_address)?;

    let max_gap = store.get_max_gap(member_id)?;
    let start = (last_index as i64 - max_gap as i64 - 1).max(1) as u64;
    if context.tracing_storage.get() {
        debug!(member = %member_id, start, last_index, max_gap, "reconciler scanning for contiguous prefix");
    }

    let mut new_saved_index = 0u64;
    let mut new_last_term = 0u64;

    for i in start..=last_index {
        match store.get(member_id, i)? {
            None => {
                delete_range(store, member_id, new_saved_index, i + 1, last_index as i64)?;
                break;
            }
            Some(entry) => {
                new_last_term = entry.term;
                new_saved_index = i;
            }
        }
    }

    let stored_count = store.count(member_id)?;
    if stored_count != new_saved_index {
        return Err(SaveQueueError::Inconsistent(format!(
            "storage has {stored_count} entries but reconciled saved_index is {new_saved_index}",
        )));
    }

    {
        let mut inner = tracker.lock();
        inner.last_term = new_last_term;
        inner.saved_index = new_saved_index;
        inner.saved.clear();
        inner.saving.clear();
        inner.queue.clear();
        inner.initialized = true;
    }
    tracker.notify_index_initialized();

    // No outstanding gaps once reconciliation has completed.
    store.set_max_gap(member_id, 0)?;

    if context.tracing_storage.get() {
        debug!(member = %member_id, saved_index = new_saved_index, "reconciler completed");
    }

    Ok(())
}
