//! Term postings and the ordered term dictionary

use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Occurrences of one term in one document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocTermInfo {
    pub term_frequency: u32,
    /// Token positions per field, ascending
    pub positions: BTreeMap<String, Vec<u32>>,
}

impl DocTermInfo {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn positions_in(&self, field: &str) -> &[u32] {
        self.positions.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn occurs_in(&self, field: &str) -> bool {
        self.positions.contains_key(field)
    }
}

/// Documents containing a term, with per-document occurrence details
#[derive(Clone, Debug, Default)]
pub struct TermPosting {
    docs: RoaringBitmap,
    entries: HashMap<u32, DocTermInfo>,
}

impl TermPosting {
    pub fn docs(&self) -> &RoaringBitmap {
        &self.docs
    }

    pub fn get(&self, docno: u32) -> Option<&DocTermInfo> {
        self.entries.get(&docno)
    }

    pub fn doc_frequency(&self) -> u64 {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Documents where the term occurs in a field accepted by `accept`
    pub fn docs_where<F>(&self, accept: F) -> RoaringBitmap
    where
        F: Fn(&str) -> bool,
    {
        self.entries
            .iter()
            .filter(|(_, info)| info.fields().any(&accept))
            .map(|(docno, _)| *docno)
            .collect()
    }

    fn add(&mut self, docno: u32, field: &str, position: u32) {
        self.docs.insert(docno);
        let info = self.entries.entry(docno).or_default();
        info.term_frequency += 1;
        info.positions
            .entry(field.to_string())
            .or_default()
            .push(position);
    }

    fn remove(&mut self, docno: u32) {
        self.docs.remove(docno);
        self.entries.remove(&docno);
    }
}

/// Ordered term dictionary. Prefix expansion is a range scan.
#[derive(Clone, Debug, Default)]
pub struct TermDictionary {
    terms: BTreeMap<String, TermPosting>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Option<&TermPosting> {
        self.terms.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Record one occurrence of `term` at `position` in `field`
    pub fn add_occurrence(&mut self, term: &str, docno: u32, field: &str, position: u32) {
        match self.terms.get_mut(term) {
            Some(posting) => posting.add(docno, field, position),
            None => {
                let mut posting = TermPosting::default();
                posting.add(docno, field, position);
                self.terms.insert(term.to_string(), posting);
            }
        }
    }

    /// Drop `docno` from the term's posting; empty postings leave the
    /// dictionary
    pub fn remove_document(&mut self, term: &str, docno: u32) {
        let now_empty = match self.terms.get_mut(term) {
            Some(posting) => {
                posting.remove(docno);
                posting.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.terms.remove(term);
        }
    }

    /// Terms starting with `prefix`, in lexicographic order
    pub fn prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TermPosting)> + 'a {
        self.terms
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(term, _)| term.starts_with(prefix))
            .map(|(term, posting)| (term.as_str(), posting))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermPosting)> {
        self.terms.iter().map(|(term, posting)| (term.as_str(), posting))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
