//! Combined index contents: documents, term postings and field tables
//!
//! One `IndexStore` value holds everything a query reads, so a published
//! snapshot can never expose a document without its postings or the
//! other way around.

use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::sync::Arc;

use super::docvalues::{date_key, FieldTables};
use super::postings::TermDictionary;
use crate::models::{Document, DocumentId, FieldValue};
use crate::schema::{FieldMapping, FieldSchema, FieldType};
use crate::tokenizer::Tokenizer;

/// Field whose tokens are kept per document for exact-title matching
pub const TITLE_FIELD: &str = "title";

/// A live document and the per-document values ranking needs
#[derive(Clone, Debug)]
pub struct DocEntry {
    pub doc: Arc<Document>,
    /// Tokens the document contributes through searchable fields
    pub token_count: u32,
    pub title_tokens: Vec<String>,
}

/// Everything the index derives from one field value
#[derive(Debug, Default)]
struct FieldKeys {
    tokens: Vec<(String, u32)>,
    keywords: Vec<String>,
    integer: Option<i64>,
    float: Option<f64>,
}

impl FieldKeys {
    fn extract(mapping: &FieldMapping, value: &FieldValue, tokenizer: &Tokenizer) -> Self {
        let mut keys = FieldKeys::default();
        match (mapping.field_type, value) {
            (FieldType::Text, FieldValue::Text(text)) => {
                keys.tokens = tokenizer.tokenize_with_positions_ordered(text);
            }
            (FieldType::Keyword, FieldValue::Text(text)) => {
                keys.tokens = tokenizer.tokenize_with_positions_ordered(text);
                let key = tokenizer.keyword_key(text);
                if !key.is_empty() {
                    keys.keywords.push(key);
                }
            }
            (FieldType::Set, FieldValue::Set(members)) => {
                // Leave a gap between members so phrases never span two
                let mut base = 0u32;
                for member in members {
                    let tokens = tokenizer.tokenize_with_positions_ordered(member);
                    let next_base = tokens.last().map(|(_, pos)| base + pos + 2).unwrap_or(base);
                    keys.tokens
                        .extend(tokens.into_iter().map(|(token, pos)| (token, base + pos)));
                    base = next_base;

                    let key = tokenizer.keyword_key(member);
                    if !key.is_empty() && !keys.keywords.contains(&key) {
                        keys.keywords.push(key);
                    }
                }
            }
            (FieldType::Integer, FieldValue::Integer(i)) => {
                keys.tokens.push((i.to_string(), 0));
                keys.integer = Some(*i);
            }
            (FieldType::Date, FieldValue::Date(d)) => {
                keys.integer = Some(date_key(*d));
            }
            (FieldType::Float, FieldValue::Float(f)) => {
                keys.float = Some(*f);
            }
            _ => {}
        }
        keys
    }
}

#[derive(Clone, Debug, Default)]
pub struct IndexStore {
    docs: Vec<Option<DocEntry>>,
    /// Vacated slots in `docs`, reused before the vector grows
    free: Vec<u32>,
    ids: HashMap<DocumentId, u32>,
    live: RoaringBitmap,
    terms: TermDictionary,
    fields: FieldTables,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn live(&self) -> &RoaringBitmap {
        &self.live
    }

    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    pub fn fields(&self) -> &FieldTables {
        &self.fields
    }

    pub fn entry(&self, docno: u32) -> Option<&DocEntry> {
        self.docs.get(docno as usize).and_then(Option::as_ref)
    }

    pub fn docno(&self, id: &DocumentId) -> Option<u32> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Arc<Document>> {
        self.docno(id).and_then(|docno| self.entry(docno)).map(|e| &e.doc)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.ids.contains_key(id)
    }

    /// Live documents in docno order
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.docs.iter().flatten().map(|entry| &entry.doc)
    }

    /// Index a document, replacing any previous version under the same id.
    pub(crate) fn insert(
        &mut self,
        doc: Arc<Document>,
        schema: &FieldSchema,
        tokenizer: &Tokenizer,
    ) -> u32 {
        self.remove(&doc.id, schema, tokenizer);

        let docno = self.free.pop().unwrap_or(self.docs.len() as u32);
        let mut token_count = 0u32;
        let mut title_tokens = Vec::new();

        for (name, value) in &doc.fields {
            let Some(mapping) = schema.get(name) else {
                continue;
            };
            let keys = FieldKeys::extract(mapping, value, tokenizer);

            for (token, position) in &keys.tokens {
                self.terms.add_occurrence(token, docno, name, *position);
            }
            if mapping.searchable {
                token_count += keys.tokens.len() as u32;
            }
            if name == TITLE_FIELD {
                title_tokens = keys.tokens.iter().map(|(t, _)| t.clone()).collect();
            }
            for key in &keys.keywords {
                self.fields.add_keyword(name, key, docno);
            }
            if let Some(i) = keys.integer {
                self.fields.add_integer(name, i, docno);
            }
            if let Some(f) = keys.float {
                self.fields.add_float(name, f, docno);
            }
        }

        self.ids.insert(doc.id.clone(), docno);
        self.live.insert(docno);
        let entry = Some(DocEntry {
            doc,
            token_count,
            title_tokens,
        });
        match self.docs.get_mut(docno as usize) {
            Some(slot) => *slot = entry,
            None => self.docs.push(entry),
        }
        docno
    }

    /// Remove a document and every key derived from it. Returns the removed
    /// document, if it was present.
    pub(crate) fn remove(
        &mut self,
        id: &DocumentId,
        schema: &FieldSchema,
        tokenizer: &Tokenizer,
    ) -> Option<Arc<Document>> {
        let docno = self.ids.remove(id)?;
        let entry = self.docs.get_mut(docno as usize).and_then(Option::take)?;
        self.live.remove(docno);
        self.free.push(docno);

        for (name, value) in &entry.doc.fields {
            let Some(mapping) = schema.get(name) else {
                continue;
            };
            let keys = FieldKeys::extract(mapping, value, tokenizer);
            for (token, _) in &keys.tokens {
                self.terms.remove_document(token, docno);
            }
            for key in &keys.keywords {
                self.fields.remove_keyword(name, key, docno);
            }
            if let Some(i) = keys.integer {
                self.fields.remove_integer(name, i, docno);
            }
            if let Some(f) = keys.float {
                self.fields.remove_float(name, f, docno);
            }
        }

        Some(entry.doc)
    }
}
