use arc_swap::ArcSwap;
use std::sync::Arc;

use super::snapshot::IndexSnapshot;

/// Holder of the active snapshot with atomic replacement
pub struct SnapshotHolder {
    inner: ArcSwap<IndexSnapshot>,
}

impl SnapshotHolder {
    pub fn new(snapshot: IndexSnapshot) -> Self {
        Self {
            inner: ArcSwap::from_pointee(snapshot),
        }
    }

    /// The active snapshot, held by the caller for the rest of a query
    pub fn load(&self) -> Arc<IndexSnapshot> {
        self.inner.load_full()
    }

    /// Atomically publish a new snapshot
    pub fn store(&self, snapshot: IndexSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    /// Get generation number
    pub fn generation(&self) -> u64 {
        self.inner.load().generation()
    }

    pub fn document_count(&self) -> usize {
        self.inner.load().document_count()
    }
}
