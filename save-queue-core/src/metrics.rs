// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

/// Metrics for a single save queue instance, registered once at
/// construction and shared by every worker and the commit tracker via
/// `Context`.
pub struct Metrics {
    /// Current depth of the append-request work queue.
    pub queue_depth: IntGauge,
    /// Number of append requests dequeued by a worker.
    pub requests_dequeued: IntCounter,
    /// Number of append requests enqueued by the consensus layer.
    pub requests_enqueued: IntCounter,
    /// Latency of `storage.append` calls, Phase B of the append handler.
    pub append_latency: Histogram,
    /// Number of times `saved_index` advanced.
    pub saved_index_advances: IntCounter,
    /// Number of entries removed by `delete_range`, summed across calls.
    pub entries_deleted: IntCounter,
    /// Number of storage errors observed by workers.
    pub storage_errors: IntCounter,
    /// Duration of reconciler runs (startup and role-transition settle).
    pub reconcile_latency: Histogram,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Self {
        let metrics = Self {
            queue_depth: IntGauge::with_opts(Opts::new(
                "save_queue_depth",
                "Current depth of the append-request work queue",
            ))
            .unwrap(),
            requests_dequeued: IntCounter::with_opts(Opts::new(
                "save_queue_requests_dequeued",
                "Number of append requests dequeued by a worker",
            ))
            .unwrap(),
            requests_enqueued: IntCounter::with_opts(Opts::new(
                "save_queue_requests_enqueued",
                "Number of append requests enqueued by the consensus layer",
            ))
            .unwrap(),
            append_latency: Histogram::with_opts(HistogramOpts::new(
                "save_queue_append_latency_seconds",
                "Latency of storage.append calls",
            ))
            .unwrap(),
            saved_index_advances: IntCounter::with_opts(Opts::new(
                "save_queue_saved_index_advances",
                "Number of times saved_index advanced",
            ))
            .unwrap(),
            entries_deleted: IntCounter::with_opts(Opts::new(
                "save_queue_entries_deleted",
                "Number of entries removed by delete_range",
            ))
            .unwrap(),
            storage_errors: IntCounter::with_opts(Opts::new(
                "save_queue_storage_errors",
                "Number of storage errors observed by workers",
            ))
            .unwrap(),
            reconcile_latency: Histogram::with_opts(HistogramOpts::new(
                "save_queue_reconcile_latency_seconds",
                "Duration of reconciler runs",
            ))
            .unwrap(),
        };

        for collector in [
            Box::new(metrics.queue_depth.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(metrics.requests_dequeued.clone()),
            Box::new(metrics.requests_enqueued.clone()),
            Box::new(metrics.append_latency.clone()),
            Box::new(metrics.saved_index_advances.clone()),
            Box::new(metrics.entries_deleted.clone()),
            Box::new(metrics.storage_errors.clone()),
            Box::new(metrics.reconcile_latency.clone()),
        ] {
            // Safe to ignore: registration only fails on duplicate metric
            // names, which would be a construction bug caught immediately
            // by tests.
            let _ = registry.register(collector);
        }

        metrics
    }

    /// Builds a `Metrics` backed by a throwaway registry, for tests that
    /// don't care about scraping.
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self::new(&Registry::new())
    }
}
