use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use super::store::IndexStore;
use crate::error::{MediadexError, Result};
use crate::models::{Document, DocumentId};
use crate::schema::FieldSchema;

/// Snapshot version for compatibility checking
pub const SNAPSHOT_VERSION: u32 = 1;

/// Immutable, versioned view of the index that queries run against
#[derive(Clone, Debug)]
pub struct IndexSnapshot {
    store: IndexStore,
    schema: Arc<FieldSchema>,
    generation: u64,
    source_marker: u64,
}

impl IndexSnapshot {
    pub(crate) fn new(
        store: IndexStore,
        schema: Arc<FieldSchema>,
        generation: u64,
        source_marker: u64,
    ) -> Self {
        Self {
            store,
            schema,
            generation,
            source_marker,
        }
    }

    /// Generation 0: nothing published yet
    pub fn empty(schema: Arc<FieldSchema>) -> Self {
        Self::new(IndexStore::new(), schema, 0, 0)
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn schema_arc(&self) -> Arc<FieldSchema> {
        Arc::clone(&self.schema)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Canonical-store mutation marker the snapshot was built from
    pub fn source_marker(&self) -> u64 {
        self.source_marker
    }

    pub fn document_count(&self) -> usize {
        self.store.len()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Arc<Document>> {
        self.store.get(id)
    }

    /// Persistable form of this snapshot
    pub fn to_persisted(&self) -> PersistedSnapshot {
        PersistedSnapshot::new(
            self.generation,
            self.source_marker,
            self.store.documents().map(|doc| (**doc).clone()).collect(),
        )
    }
}

/// On-disk form of a published snapshot. Only documents are stored; the
/// postings and field tables are rebuilt on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub generation: u64,
    pub source_marker: u64,
    pub documents: Vec<Document>,
}

impl PersistedSnapshot {
    pub fn new(generation: u64, source_marker: u64, documents: Vec<Document>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generation,
            source_marker,
            documents,
        }
    }

    /// Serialize snapshot to bytes
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize snapshot from bytes
    pub fn from_bytes(data: &[u8]) -> std::result::Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Check if this snapshot version is compatible
    pub fn is_compatible(&self) -> bool {
        self.version <= SNAPSHOT_VERSION
    }

    /// Write the snapshot next to `path` and rename it into place
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, self.to_bytes()?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot, or `None` when no file exists yet
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = Self::from_bytes(&data)?;
        if !snapshot.is_compatible() {
            return Err(MediadexError::IncompatibleSnapshot {
                expected: SNAPSHOT_VERSION,
                actual: snapshot.version,
            });
        }
        Ok(Some(snapshot))
    }
}
