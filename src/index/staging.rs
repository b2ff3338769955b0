use std::sync::Arc;

use super::snapshot::IndexSnapshot;
use super::store::IndexStore;
use crate::models::{Document, DocumentId};
use crate::schema::FieldSchema;
use crate::tokenizer::Tokenizer;

/// Mutable index owned by the single writer.
///
/// Between mutations its content equals the active snapshot's; `snapshot`
/// materializes an immutable copy for publication.
#[derive(Clone, Debug)]
pub struct StagingIndex {
    store: IndexStore,
    schema: Arc<FieldSchema>,
    tokenizer: Tokenizer,
}

impl StagingIndex {
    pub fn new(schema: Arc<FieldSchema>, tokenizer: Tokenizer) -> Self {
        Self {
            store: IndexStore::new(),
            schema,
            tokenizer,
        }
    }

    /// Staging whose content equals `snapshot`
    pub fn from_snapshot(snapshot: &IndexSnapshot, tokenizer: Tokenizer) -> Self {
        Self {
            store: snapshot.store().clone(),
            schema: snapshot.schema_arc(),
            tokenizer,
        }
    }

    /// Index a document, replacing any previous version with the same id
    pub fn insert(&mut self, doc: Document) -> u32 {
        self.store
            .insert(Arc::new(doc), &self.schema, &self.tokenizer)
    }

    /// Remove a document. Returns whether it was present.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        self.store
            .remove(id, &self.schema, &self.tokenizer)
            .is_some()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Arc<Document>> {
        self.store.get(id)
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Immutable copy of the current content
    pub fn snapshot(&self, generation: u64, source_marker: u64) -> IndexSnapshot {
        IndexSnapshot::new(
            self.store.clone(),
            Arc::clone(&self.schema),
            generation,
            source_marker,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldMapBuilder;

    fn staging() -> StagingIndex {
        StagingIndex::new(Arc::new(FieldSchema::media()), Tokenizer::default())
    }

    fn doc(id: &str, title: &str) -> Document {
        Document::new(id, FieldMapBuilder::new().field("title", title).build(), 1)
    }

    #[test]
    fn test_snapshot_is_detached_from_staging() {
        let mut staging = staging();
        staging.insert(doc("m1", "Batman Begins"));

        let snapshot = staging.snapshot(1, 10);
        staging.insert(doc("m2", "The Batman"));
        staging.remove(&DocumentId::from("m1"));

        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.source_marker(), 10);
        assert_eq!(snapshot.document_count(), 1);
        assert!(snapshot.get(&DocumentId::from("m1")).is_some());
        assert_eq!(staging.len(), 1);
    }

    #[test]
    fn test_from_snapshot_matches_content() {
        let mut staging = staging();
        staging.insert(doc("m1", "Batman Begins"));
        let snapshot = staging.snapshot(4, 0);

        let copy = StagingIndex::from_snapshot(&snapshot, Tokenizer::default());
        assert_eq!(copy.len(), 1);
        assert!(copy.store().terms().contains("begins"));
    }

    #[test]
    fn test_remove_missing_document() {
        let mut staging = staging();
        assert!(!staging.remove(&DocumentId::from("nope")));
        assert!(staging.is_empty());
    }
}
