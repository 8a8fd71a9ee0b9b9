// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

//! Persistence pipeline for a single Raft log member.
//!
//! A [`SaveQueue`] accepts append requests out of order from the consensus
//! layer, writes them to a pluggable [`Store`], and tracks the longest
//! contiguous prefix that is durably stored (`saved_index`). Everything
//! else in this crate exists to make that tracking safe under concurrent
//! workers: the commit tracker serializes state transitions, the append
//! handler implements the decide/write/reconcile protocol, and the
//! reconciler rebuilds `saved_index` from storage on startup and on demand.

mod append;
mod commit_tracker;
mod context;
mod delete_range;
mod entry;
mod error;
mod metrics;
mod reconciler;
mod save_queue;
mod storage;
mod worker;

pub use context::MemberId;
pub use entry::{AppendRequest, Entry, NullRoleNotifier, RoleNotifier, Rid};
pub use error::{SaveQueueError, SaveQueueResult};
pub use save_queue::SaveQueue;
pub use storage::mem_store::MemStore;
pub use storage::Store;
