// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type SaveQueueResult<T> = Result<T, SaveQueueError>;

#[derive(Error, Debug)]
pub enum SaveQueueError {
    /// The storage backend failed to complete an operation.
    #[error("storage operation failed: {0}")]
    Storage(#[from] anyhow::Error),

    /// An entry the contiguous prefix says should exist is missing, or the
    /// stored entry count disagrees with the reconciled saved index, and
    /// this member's storage can no longer be trusted without intervention.
    #[error("log is inconsistent: {0}")]
    Inconsistent(String),

    /// `get_latest` was called before the reconciler has produced an
    /// initial saved index.
    #[error("save queue has not been initialized yet")]
    NotInitialized,

    /// Another live process already owns this member's storage rows.
    #[error("storage for this member is already owned by {owner}")]
    AlreadyOwned { owner: String },

    /// The save queue is shutting down.
    #[error("save queue is shutting down")]
    Cancelled,
}
