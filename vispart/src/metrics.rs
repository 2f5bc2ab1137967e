use std::sync::Arc;

use witchcraft_metrics::{Counter, MetricRegistry, Metrics, Timer};

const PARTITION_ROWS: &str = "vispart.partition.rows";
const PARTITION_BYTES: &str = "vispart.partition.bytes";
const PARTITION_DURATION: &str = "vispart.partition.duration";
const MODEL_WRITES: &str = "vispart.model.writes";
const UNPARTITION_COMMITS: &str = "vispart.unpartition.commits";
const UNPARTITION_ROWS: &str = "vispart.unpartition.rows";
const CLEANUP_PASSES: &str = "vispart.cleanup.passes";

/// Counters and timers of the store, backed by a shared metric registry.
///
/// Clones share the registry, so a handle can carry the metrics of the partition call that created
/// it and count its commit and cleanup against the same registry.
#[derive(Clone, Default)]
pub struct StoreMetrics {
    registry: Arc<MetricRegistry>,
}

impl StoreMetrics {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    /// Selected records written by partition calls.
    pub fn partition_rows(&self) -> Arc<Counter> {
        self.registry.counter(PARTITION_ROWS)
    }

    /// Bytes written to shard files.
    pub fn partition_bytes(&self) -> Arc<Counter> {
        self.registry.counter(PARTITION_BYTES)
    }

    pub fn partition_duration(&self) -> Arc<Timer> {
        self.registry.timer(PARTITION_DURATION)
    }

    /// Rows written into mapped model files.
    pub fn model_writes(&self) -> Arc<Counter> {
        self.registry.counter(MODEL_WRITES)
    }

    pub fn unpartition_commits(&self) -> Arc<Counter> {
        self.registry.counter(UNPARTITION_COMMITS)
    }

    /// Dataset rows whose model was rewritten by a commit.
    pub fn unpartition_rows(&self) -> Arc<Counter> {
        self.registry.counter(UNPARTITION_ROWS)
    }

    pub fn cleanup_passes(&self) -> Arc<Counter> {
        self.registry.counter(CLEANUP_PASSES)
    }

    pub fn snapshot(&self) -> Metrics {
        self.registry.metrics()
    }
}
