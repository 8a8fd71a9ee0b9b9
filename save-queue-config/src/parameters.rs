// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Operational configuration of a save queue instance.
///
/// All fields should tolerate being set differently across members of the
/// same cluster without affecting correctness of the protocol; they only
/// tune local resource usage and observability.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Parameters {
    /// Number of worker threads draining the append-request queue. Read
    /// once when the save queue starts.
    #[serde(default = "Parameters::default_save_queue_workers")]
    pub save_queue_workers: u32,

    /// Initial state of the `tracing.storage` verbose-logging flag. Once
    /// the save queue starts, use the returned `TracingFlag` to change
    /// this at runtime instead of reconstructing `Parameters`.
    #[serde(default)]
    pub tracing_storage: bool,
}

impl Parameters {
    pub fn default_save_queue_workers() -> u32 {
        5
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            save_queue_workers: Parameters::default_save_queue_workers(),
            tracing_storage: false,
        }
    }
}

/// Shared, lock-free handle to the `tracing.storage` flag. Cloning shares
/// the same underlying flag; `set` takes effect for every clone
/// immediately, which is what lets the flag be reloaded at runtime without
/// touching the commit-tracker mutex.
#[derive(Clone, Debug)]
pub struct TracingFlag(Arc<AtomicBool>);

impl TracingFlag {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

impl From<&Parameters> for TracingFlag {
    fn from(parameters: &Parameters) -> Self {
        TracingFlag::new(parameters.tracing_storage)
    }
}
