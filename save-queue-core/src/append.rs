// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use tracing::{trace, warn};

use crate::commit_tracker::CommitTracker;
use crate::context::Context;
use crate::delete_range::delete_range;
use crate::entry::{AppendRequest, RoleNotifier};
use crate::error::{SaveQueueError, SaveQueueResult};
use crate::storage::Store;

/// Rounds `n` up to the next multiple of 10, the step `max_gap` grows by
/// whenever a request pushes further ahead of the contiguous prefix than
/// the currently persisted bound allows.
fn round_up_to_ten(n: u64) -> u32 {
    (((n + 9) / 10) * 10) as u32
}

enum Decision {
    /// Request is already handled: duplicate in-flight write, duplicate
    /// completed write, or an overwrite whose payload matches what is
    /// already stored.
    NoOp,
    /// Proceed to Phase B. `deleted_count` is non-zero only when this
    /// request forced an overwrite.
    Proceed { deleted_count: u64 },
}

/// Runs one append request through all three phases of the protocol:
/// decide under lock, write without the lock, then reconcile under lock
/// again. Called by a worker thread once per dequeued request.
pub(crate) fn handle(
    tracker: &CommitTracker,
    store: &dyn Store,
    context: &Context,
    notifier: &dyn RoleNotifier,
    request: AppendRequest,
) -> SaveQueueResult<()> {
    let index = request.target_index();
    let term = request.term;
    let member_id = context.member_id;

    let decision = decide(tracker, store, context, index, &request)?;
    let deleted_count = match decision {
        Decision::NoOp => return Ok(()),
        Decision::Proceed { deleted_count } => deleted_count,
    };

    // Phase B: the only slow operation, run without holding the lock.
    let append_timer = context.metrics.append_latency.start_timer();
    let append_result = store.append(member_id, term, index, request.payload);
    append_timer.observe_duration();
    if let Err(err) = append_result {
        // The write never landed, so this index must not be left reserved:
        // a future retry for the same index needs to see it absent from
        // `saving` in order to be accepted.
        tracker.lock().saving.remove(&index);
        return Err(err.into());
    }

    let advanced = reconcile(tracker, context, index, term);

    if advanced || deleted_count > 0 {
        if advanced {
            context.metrics.saved_index_advances.inc();
        }
        notifier.index_updated(false, deleted_count > 0);
    }

    Ok(())
}

/// Phase A: decide what to do with this request under lock. Returns
/// `Decision::Proceed` when Phase B must run; `index` stays reserved in
/// `saving` for the caller to clear in Phase C.
fn decide(
    tracker: &CommitTracker,
    store: &dyn Store,
    context: &Context,
    index: u64,
    request: &AppendRequest,
) -> SaveQueueResult<Decision> {
    let member_id = context.member_id;
    let mut inner = tracker.lock();

    // 1. Another worker is already writing this index: idempotent re-send.
    if inner.saving.contains(&index) {
        if context.tracing_storage.get() {
            trace!(member = %member_id, index, "duplicate in-flight append, no-op");
        }
        return Ok(Decision::NoOp);
    }

    // 2. Possibly divergent overwrite of already-saved history.
    if index <= inner.saved_index {
        let existing = store.get(member_id, index)?;
        let Some(existing) = existing else {
            return Err(SaveQueueError::Inconsistent(format!(
                "entry {index} is missing but saved_index is {}",
                inner.saved_index
            )));
        };
        if existing.payload == request.payload {
            if context.tracing_storage.get() {
                trace!(member = %member_id, index, "overwrite payload matches stored entry, no-op");
            }
            return Ok(Decision::NoOp);
        }

        let last_to_delete = inner
            .saving
            .iter()
            .copied()
            .max()
            .map(|m| m as i64)
            .unwrap_or(-1);
        inner.saved_index = index - 1;
        let deleted_count = delete_range(store, member_id, inner.saved_index, index, last_to_delete)?;
        if deleted_count > 0 {
            context.metrics.entries_deleted.inc_by(deleted_count);
        }
        inner.saving.insert(index);
        return Ok(Decision::Proceed { deleted_count });
    }

    // 3. Already written out-of-order by another worker.
    if inner.saved.contains_key(&index) {
        if context.tracing_storage.get() {
            trace!(member = %member_id, index, "duplicate completed append, no-op");
        }
        return Ok(Decision::NoOp);
    }

    // 4. Normal case: reserve the index and grow the persisted gap bound
    // if this request pushes further ahead of the prefix than before.
    let candidate_gap = index - inner.saved_index;
    if candidate_gap > inner.max_gap as u64 {
        let new_max_gap = round_up_to_ten(candidate_gap);
        store.set_max_gap(member_id, new_max_gap)?;
        if context.tracing_storage.get() {
            trace!(member = %member_id, index, old_max_gap = inner.max_gap, new_max_gap, "growing persisted max_gap");
        }
        inner.max_gap = new_max_gap;
    }
    inner.saving.insert(index);
    Ok(Decision::Proceed { deleted_count: 0 })
}

/// Phase C: reconcile bookkeeping after the unlocked write completes.
/// Returns whether `saved_index` advanced.
fn reconcile(tracker: &CommitTracker, context: &Context, mut index: u64, term: u64) -> bool {
    let mut inner = tracker.lock();

    if !inner.saving.remove(&index) {
        warn!(
            member = %context.member_id,
            index,
            "index was not present in `saving` when Phase C ran",
        );
    }

    if index == inner.saved_index + 1 {
        inner.saved_index = index;
        inner.last_term = term;
        index += 1;
        while let Some(&next_term) = inner.saved.get(&index) {
            inner.last_term = next_term;
            inner.saved.remove(&index);
            inner.saved_index = index;
            index += 1;
        }
        if context.tracing_storage.get() {
            trace!(member = %context.member_id, saved_index = inner.saved_index, "saved_index advanced");
        }
        true
    } else if index > inner.saved_index {
        inner.saved.insert(index, term);
        if context.tracing_storage.get() {
            trace!(member = %context.member_id, index, "buffered out-of-order completion");
        }
        false
    } else {
        warn!(
            member = %context.member_id,
            index,
            saved_index = inner.saved_index,
            "saved_index already passed this worker's index; likely raced an overwrite",
        );
        false
    }
}
