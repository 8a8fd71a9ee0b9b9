// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

pub mod mem_store;

use bytes::Bytes;

use crate::context::MemberId;
use crate::entry::Entry;

/// Durable, random-access log indexed by `(member_id, index)`. Shared with
/// readers elsewhere in the process; a save queue instance is the only
/// writer for its member (see `get_owner_pid`/`set_owner_pid`).
///
/// All operations are synchronous and may block on I/O; callers invoke
/// them outside the commit-tracker mutex except for the two point reads
/// used to decide an overwrite (see `append::handle`).
pub trait Store: Send + Sync + 'static {
    /// Returns the entry with the highest stored index, or `None` if the
    /// member has no entries.
    fn get_last(&self, member_id: MemberId) -> anyhow::Result<Option<Entry>>;

    /// Point lookup; `None` if `index` is not present.
    fn get(&self, member_id: MemberId, index: u64) -> anyhow::Result<Option<Entry>>;

    /// Inserts at an arbitrary index. Must tolerate non-monotonic index
    /// arrival. Fails if `index` is already occupied.
    fn append(
        &self,
        member_id: MemberId,
        term: u64,
        index: u64,
        payload: Bytes,
    ) -> anyhow::Result<()>;

    /// Removes the entry at `index`. Idempotent when already absent.
    fn delete(&self, member_id: MemberId, index: u64) -> anyhow::Result<()>;

    /// Number of entries stored for `member_id`.
    fn count(&self, member_id: MemberId) -> anyhow::Result<u64>;

    fn get_max_gap(&self, member_id: MemberId) -> anyhow::Result<u32>;

    fn set_max_gap(&self, member_id: MemberId, max_gap: u32) -> anyhow::Result<()>;

    fn get_owner_pid(&self, member_id: MemberId) -> anyhow::Result<Option<String>>;

    fn set_owner_pid(&self, member_id: MemberId, pid: &str) -> anyhow::Result<()>;

    fn get_owner_address(&self, member_id: MemberId) -> anyhow::Result<Option<String>>;

    fn set_owner_address(&self, member_id: MemberId, address: &str) -> anyhow::Result<()>;
}
