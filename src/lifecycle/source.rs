//! Canonical-store boundary: where rebuilds read records from

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::error::{MediadexError, Result};
use crate::models::{DocumentId, FieldMap};
use crate::schema::FieldSchema;

/// One record as held by the canonical store
pub type SourceRecord = (DocumentId, FieldMap);

/// Lazily produced batches of records
pub type SourceBatches<'a> = Box<dyn Iterator<Item = Result<Vec<SourceRecord>>> + Send + 'a>;

/// The canonical store the engine indexes from
pub trait DocumentSource: Send + Sync {
    /// Monotonic counter bumped by every mutation of the store
    fn latest_mutation_marker(&self) -> Result<u64>;

    /// Every record, `batch_size` at a time
    fn stream_batches(&self, batch_size: usize) -> Result<SourceBatches<'_>>;

    /// A single record, `None` if it no longer exists
    fn fetch(&self, id: &DocumentId) -> Result<Option<FieldMap>>;
}

/// Canonical store held in memory, used by tests and the CLI
#[derive(Debug, Default)]
pub struct InMemorySource {
    records: RwLock<BTreeMap<DocumentId, FieldMap>>,
    marker: AtomicU64,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. Returns the new mutation marker.
    pub fn upsert(&self, id: impl Into<DocumentId>, fields: FieldMap) -> u64 {
        self.records.write().insert(id.into(), fields);
        self.marker.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&self, id: &DocumentId) -> bool {
        let removed = self.records.write().remove(id).is_some();
        if removed {
            self.marker.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Load a JSON-lines corpus: one object per line with an `id` member
    /// (string or number) and the record's fields.
    ///
    /// Lines that are not valid records are logged and skipped.
    pub fn from_jsonl<R: BufRead>(reader: R, schema: &FieldSchema) -> Result<Self> {
        let source = Self::new();
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(&line, schema) {
                Ok((id, fields)) => {
                    source.upsert(id, fields);
                }
                Err(reason) => {
                    skipped += 1;
                    warn!(line = line_no + 1, %reason, "skipping corpus record");
                }
            }
        }

        info!(records = source.len(), skipped, "corpus loaded");
        Ok(source)
    }
}

fn parse_record(line: &str, schema: &FieldSchema) -> std::result::Result<SourceRecord, String> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| format!("malformed JSON: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| "record is not a JSON object".to_string())?;

    let id = match object.get("id") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => DocumentId::new(s.clone()),
        Some(serde_json::Value::Number(n)) => DocumentId::new(n.to_string()),
        _ => return Err("record has no usable 'id'".to_string()),
    };

    let mut fields = FieldMap::new();
    for (name, value) in object {
        if name == "id" || value.is_null() {
            continue;
        }
        let name = name.to_ascii_lowercase();
        let typed = schema.coerce_json(&name, value)?;
        fields.insert(name, typed);
    }
    Ok((id, fields))
}

impl DocumentSource for InMemorySource {
    fn latest_mutation_marker(&self) -> Result<u64> {
        Ok(self.marker.load(Ordering::SeqCst))
    }

    fn stream_batches(&self, batch_size: usize) -> Result<SourceBatches<'_>> {
        if batch_size == 0 {
            return Err(MediadexError::Source("batch size must be positive".to_string()));
        }
        // Copy out so a long rebuild never holds the store lock
        let records: Vec<SourceRecord> = self
            .records
            .read()
            .iter()
            .map(|(id, fields)| (id.clone(), fields.clone()))
            .collect();

        let mut records = records.into_iter();
        Ok(Box::new(std::iter::from_fn(move || {
            let batch: Vec<SourceRecord> = records.by_ref().take(batch_size).collect();
            (!batch.is_empty()).then_some(Ok(batch))
        })))
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<FieldMap>> {
        Ok(self.records.read().get(id).cloned())
    }
}
