// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use prometheus::Registry;
use save_queue_config::{Parameters, TracingFlag};

use crate::metrics::Metrics;

/// Opaque identity of the Raft log member a save queue instance owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-member configuration and metrics shared by every component of a
/// save queue instance: the commit tracker, the workers and the
/// reconciler.
#[derive(Clone)]
pub struct Context {
    pub member_id: MemberId,
    pub parameters: Parameters,
    pub tracing_storage: TracingFlag,
    pub metrics: Arc<Metrics>,
}

impl Context {
    pub fn new(member_id: MemberId, parameters: Parameters, registry: &Registry) -> Self {
        let tracing_storage = TracingFlag::from(&parameters);
        Self {
            member_id,
            parameters,
            tracing_storage,
            metrics: Arc::new(Metrics::new(registry)),
        }
    }

    #[cfg(test)]
    pub fn new_for_test(member_id: u64) -> Self {
        Self {
            member_id: MemberId(member_id),
            parameters: Parameters::default(),
            tracing_storage: TracingFlag::new(false),
            metrics: Arc::new(Metrics::new_for_test()),
        }
    }
}
