use crate::observability::metrics::Metrics;
use crate::tracker::SnapshotReader;

/// Shared state of the local status surface. Read-only with respect to tracking.
pub struct AppState {
    pub reader: SnapshotReader,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(reader: SnapshotReader, metrics: Metrics) -> Self {
        Self { reader, metrics }
    }
}
