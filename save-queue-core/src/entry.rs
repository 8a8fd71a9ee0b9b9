// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;

/// A single entry as stored by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub term: u64,
    pub index: u64,
    pub payload: Bytes,
}

/// Snapshot of the tip of the contiguous prefix: `(last_term, saved_index)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rid {
    pub term: u64,
    pub index: u64,
}

/// An append request handed to the save queue by the consensus layer. The
/// target index is always `prev_index + 1`.
#[derive(Clone, Debug)]
pub struct AppendRequest {
    pub prev_index: u64,
    pub term: u64,
    pub payload: Bytes,
}

impl AppendRequest {
    pub fn new(prev_index: u64, term: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            prev_index,
            term,
            payload: payload.into(),
        }
    }

    /// The log index this request is targeting.
    pub fn target_index(&self) -> u64 {
        self.prev_index + 1
    }
}

/// Callback into the Raft role machine. Fired whenever `saved_index`
/// advances, entries are deleted, or a worker observes a storage error.
pub trait RoleNotifier: Send + Sync + 'static {
    fn index_updated(&self, is_error: bool, deleted: bool);
}

/// A `RoleNotifier` that drops every notification, for tests that only
/// care about the commit tracker's state.
pub struct NullRoleNotifier;

impl RoleNotifier for NullRoleNotifier {
    fn index_updated(&self, _is_error: bool, _deleted: bool) {}
}
