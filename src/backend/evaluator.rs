//! AST evaluation shared by the built-in backends
//!
//! The evaluator walks the query once, left to right, and never short
//! circuits: every positive scoring leaf gets its slot in the match
//! metadata even when a sibling already ruled the document out. A
//! capability missing from the backend's set is degraded per node and
//! recorded on the resulting `CandidateSet`.

use roaring::RoaringBitmap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use tracing::debug;

use super::capability::{Capability, CapabilitySet};
use super::fuzzy;
use super::{CandidateSet, LeafMatch, MatchMetadata};
use crate::config::FuzzyConfig;
use crate::index::{date_key, DocTermInfo, IndexSnapshot, TermDictionary, TermPosting};
use crate::query::{FieldFilter, FilterOp, FilterValue, QueryNode};
use crate::schema::FieldType;

/// Match quality of a prefix expansion
pub const WILDCARD_QUALITY: f32 = 0.9;

/// Match quality of a typo expansion at edit distance `distance`
pub fn fuzzy_quality(distance: u32) -> f32 {
    1.0 / (1.0 + distance as f32)
}

/// How query terms are matched against the term dictionary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermMode {
    /// Whole-token equality
    Token,
    /// Any dictionary token containing the query term
    Substring,
}

/// Fields a term lookup considers
#[derive(Clone, Copy)]
enum Scope<'q> {
    Searchable,
    Field(&'q str),
}

type Hits = HashMap<u32, LeafMatch>;

pub struct Evaluator<'a> {
    snapshot: &'a IndexSnapshot,
    capabilities: CapabilitySet,
    fuzzy: &'a FuzzyConfig,
    mode: TermMode,
    searchable: HashSet<&'a str>,
    leaf_count: usize,
    next_leaf: usize,
    matches: HashMap<u32, MatchMetadata>,
    best_effort: bool,
    degraded: CapabilitySet,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        snapshot: &'a IndexSnapshot,
        capabilities: CapabilitySet,
        fuzzy: &'a FuzzyConfig,
        mode: TermMode,
    ) -> Self {
        Self {
            snapshot,
            capabilities,
            fuzzy,
            mode,
            searchable: snapshot.schema().searchable_fields().collect(),
            leaf_count: 0,
            next_leaf: 0,
            matches: HashMap::new(),
            best_effort: false,
            degraded: CapabilitySet::empty(),
        }
    }

    /// Evaluate `ast` into a candidate set
    pub fn run(mut self, ast: &QueryNode) -> CandidateSet {
        self.leaf_count = ast.scoring_leaves().len();
        let docs = self.eval(ast, true);

        let mut matches = std::mem::take(&mut self.matches);
        matches.retain(|docno, _| docs.contains(*docno));

        CandidateSet {
            docs,
            matches,
            best_effort: self.best_effort,
            degraded: self.degraded,
        }
    }

    fn eval(&mut self, node: &QueryNode, positive: bool) -> RoaringBitmap {
        match node {
            QueryNode::Empty => RoaringBitmap::new(),
            QueryNode::Term(term) => {
                let hits = self.term_hits(term, Scope::Searchable, true);
                self.record(positive, hits)
            }
            QueryNode::Phrase(tokens) => {
                let hits = self.phrase_hits(tokens, Scope::Searchable);
                self.record(positive, hits)
            }
            QueryNode::Wildcard { field, prefix } => {
                let hits = self.wildcard_hits(field.as_deref(), prefix);
                self.record(positive, hits)
            }
            QueryNode::Field(filter) => self.filter(filter, positive),
            QueryNode::Not(inner) => {
                if !self.has(Capability::Boolean) {
                    self.degrade(Capability::Boolean);
                    return self.universe();
                }
                let excluded = self.eval(inner, false);
                self.universe() - excluded
            }
            QueryNode::And(left, right) => {
                let left = self.eval(left, positive);
                let right = self.eval(right, positive);
                if self.has(Capability::Boolean) {
                    left & right
                } else {
                    self.degrade(Capability::Boolean);
                    left | right
                }
            }
            QueryNode::Or(left, right) => {
                let left = self.eval(left, positive);
                let right = self.eval(right, positive);
                left | right
            }
        }
    }

    fn filter(&mut self, filter: &FieldFilter, positive: bool) -> RoaringBitmap {
        let snapshot = self.snapshot;
        let tables = snapshot.store().fields();
        let field = filter.field.as_str();

        match &filter.op {
            FilterOp::Eq(FilterValue::Text(tokens)) => {
                let hits = if tokens.len() == 1 {
                    self.term_hits(&tokens[0], Scope::Field(field), false)
                } else {
                    self.phrase_hits(tokens, Scope::Field(field))
                };
                self.record(positive, hits)
            }
            FilterOp::Eq(FilterValue::Keyword(key)) => tables.keyword_docs(field, key),
            FilterOp::Eq(FilterValue::Integer(i)) => {
                tables.integer_range(field, Bound::Included(*i), Bound::Included(*i))
            }
            FilterOp::Eq(FilterValue::Date(d)) => {
                let key = date_key(*d);
                tables.integer_range(field, Bound::Included(key), Bound::Included(key))
            }
            FilterOp::Eq(FilterValue::Float(x)) => {
                tables.float_range(field, Bound::Included(*x), Bound::Included(*x))
            }
            FilterOp::Range { low, high } => {
                if !self.has(Capability::Range) {
                    self.degrade(Capability::Range);
                    return self.universe();
                }
                match snapshot.schema().field_type(field) {
                    Some(FieldType::Float) => tables.float_range(
                        field,
                        float_bound(low.as_ref()),
                        float_bound(high.as_ref()),
                    ),
                    Some(FieldType::Integer | FieldType::Date) => tables.integer_range(
                        field,
                        integer_bound(low.as_ref()),
                        integer_bound(high.as_ref()),
                    ),
                    _ => RoaringBitmap::new(),
                }
            }
        }
    }

    fn term_hits(&mut self, term: &str, scope: Scope<'_>, allow_fuzzy: bool) -> Hits {
        let dictionary = self.dictionary();
        let mut hits = Hits::new();

        match self.mode {
            TermMode::Token => {
                if let Some(posting) = dictionary.get(term) {
                    self.collect(posting, scope, 1.0, &mut hits);
                }
            }
            TermMode::Substring => {
                let term_len = term.chars().count() as f32;
                for (candidate, posting) in dictionary.iter() {
                    if candidate.contains(term) {
                        let quality = term_len / candidate.chars().count() as f32;
                        self.collect(posting, scope, quality, &mut hits);
                    }
                }
            }
        }

        if allow_fuzzy && hits.is_empty() && self.fuzzy.allowed_distance(term.chars().count()) > 0 {
            if self.has(Capability::Fuzzy) {
                for expansion in fuzzy::expand(dictionary, term, self.fuzzy, false) {
                    let quality = fuzzy_quality(expansion.distance);
                    self.collect(expansion.posting, scope, quality, &mut hits);
                }
            } else {
                self.degrade(Capability::Fuzzy);
            }
        }

        hits
    }

    fn phrase_hits(&mut self, tokens: &[String], scope: Scope<'_>) -> Hits {
        if !self.has(Capability::Phrase) {
            self.degrade(Capability::Phrase);
            let mut combined: Option<Hits> = None;
            for token in tokens {
                let hits = self.term_hits(token, scope, false);
                combined = Some(match combined {
                    None => hits,
                    Some(acc) => intersect_hits(acc, hits),
                });
            }
            return combined.unwrap_or_default();
        }

        let dictionary = self.dictionary();
        let Some(postings) = tokens
            .iter()
            .map(|token| dictionary.get(token))
            .collect::<Option<Vec<&TermPosting>>>()
        else {
            return Hits::new();
        };
        let Some((first, rest)) = postings.split_first() else {
            return Hits::new();
        };

        let mut candidates = first.docs().clone();
        for posting in rest {
            candidates &= posting.docs();
        }

        let mut hits = Hits::new();
        for docno in candidates.iter() {
            let Some(infos) = postings
                .iter()
                .map(|posting| posting.get(docno))
                .collect::<Option<Vec<&DocTermInfo>>>()
            else {
                continue;
            };

            let mut fields = BTreeSet::new();
            let mut occurrences = 0u32;
            for field in infos[0].fields().filter(|f| self.accepts(scope, f)) {
                let found = phrase_occurrences(&infos, field);
                if found > 0 {
                    fields.insert(field.to_string());
                    occurrences += found * tokens.len() as u32;
                }
            }
            if occurrences > 0 {
                hits.insert(docno, LeafMatch::new(1.0, occurrences, fields));
            }
        }
        hits
    }

    fn wildcard_hits(&mut self, field: Option<&str>, prefix: &str) -> Hits {
        let snapshot = self.snapshot;
        let tables = snapshot.store().fields();
        let keyword_field = field.filter(|f| {
            matches!(
                snapshot.schema().field_type(f),
                Some(FieldType::Keyword | FieldType::Set)
            )
        });

        if !self.has(Capability::Wildcard) {
            self.degrade(Capability::Wildcard);
            return match (keyword_field, field) {
                (Some(f), _) => keyword_hits(f, &tables.keyword_docs(f, prefix), 1.0),
                (None, Some(f)) => self.term_hits(prefix, Scope::Field(f), false),
                (None, None) => self.term_hits(prefix, Scope::Searchable, true),
            };
        }

        if let Some(f) = keyword_field {
            return keyword_hits(f, &tables.keyword_prefix_docs(f, prefix), WILDCARD_QUALITY);
        }

        let scope = field.map_or(Scope::Searchable, Scope::Field);
        let dictionary = self.dictionary();
        let mut hits = Hits::new();
        for (_, posting) in dictionary.prefix(prefix) {
            self.collect(posting, scope, WILDCARD_QUALITY, &mut hits);
        }

        if hits.is_empty() && self.fuzzy.allowed_distance(prefix.chars().count()) > 0 {
            if self.has(Capability::Fuzzy) {
                for expansion in fuzzy::expand(dictionary, prefix, self.fuzzy, true) {
                    let quality = WILDCARD_QUALITY * fuzzy_quality(expansion.distance);
                    self.collect(expansion.posting, scope, quality, &mut hits);
                }
            } else {
                self.degrade(Capability::Fuzzy);
            }
        }
        hits
    }

    /// Merge a posting's documents into `hits`, keeping only occurrences in
    /// fields the scope accepts
    fn collect(&self, posting: &TermPosting, scope: Scope<'_>, quality: f32, hits: &mut Hits) {
        for docno in posting.docs().iter() {
            let Some(info) = posting.get(docno) else {
                continue;
            };
            let mut fields = BTreeSet::new();
            let mut occurrences = 0u32;
            for field in info.fields().filter(|f| self.accepts(scope, f)) {
                occurrences += info.positions_in(field).len() as u32;
                fields.insert(field.to_string());
            }
            if fields.is_empty() {
                continue;
            }
            let found = LeafMatch::new(quality, occurrences, fields);
            match hits.get_mut(&docno) {
                Some(existing) => existing.merge(found),
                None => {
                    hits.insert(docno, found);
                }
            }
        }
    }

    /// Store `hits` under the next leaf slot when the leaf scores
    fn record(&mut self, positive: bool, hits: Hits) -> RoaringBitmap {
        let docs: RoaringBitmap = hits.keys().copied().collect();
        if positive {
            let slot = self.next_leaf;
            self.next_leaf += 1;
            let leaf_count = self.leaf_count;
            for (docno, found) in hits {
                let metadata = self
                    .matches
                    .entry(docno)
                    .or_insert_with(|| vec![None; leaf_count]);
                if let Some(entry) = metadata.get_mut(slot) {
                    *entry = Some(found);
                }
            }
        }
        docs
    }

    fn accepts(&self, scope: Scope<'_>, field: &str) -> bool {
        match scope {
            Scope::Searchable => self.searchable.contains(field),
            Scope::Field(name) => field == name,
        }
    }

    fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    fn degrade(&mut self, capability: Capability) {
        if !self.degraded.contains(capability) {
            debug!(capability = %capability, mode = ?self.mode, "capability missing, degrading clause");
        }
        self.degraded.insert(capability);
        self.best_effort = true;
    }

    fn dictionary(&self) -> &'a TermDictionary {
        self.snapshot.store().terms()
    }

    fn universe(&self) -> RoaringBitmap {
        self.snapshot.store().live().clone()
    }
}

/// Number of positions where `infos` occur consecutively within `field`
fn phrase_occurrences(infos: &[&DocTermInfo], field: &str) -> u32 {
    let Some((first, rest)) = infos.split_first() else {
        return 0;
    };
    first
        .positions_in(field)
        .iter()
        .filter(|&&start| {
            rest.iter().enumerate().all(|(offset, info)| {
                info.positions_in(field)
                    .binary_search(&(start + offset as u32 + 1))
                    .is_ok()
            })
        })
        .count() as u32
}

fn keyword_hits(field: &str, docs: &RoaringBitmap, quality: f32) -> Hits {
    docs.iter()
        .map(|docno| (docno, LeafMatch::new(quality, 1, [field.to_string()])))
        .collect()
}

/// Documents present in both; the weaker match quality wins
fn intersect_hits(mut left: Hits, mut right: Hits) -> Hits {
    left.retain(|docno, _| right.contains_key(docno));
    for (docno, found) in left.iter_mut() {
        if let Some(other) = right.remove(docno) {
            found.quality = found.quality.min(other.quality);
            found.occurrences += other.occurrences;
            found.fields.extend(other.fields);
        }
    }
    left
}

fn integer_bound(value: Option<&FilterValue>) -> Bound<i64> {
    match value {
        Some(FilterValue::Integer(i)) => Bound::Included(*i),
        Some(FilterValue::Date(d)) => Bound::Included(date_key(*d)),
        _ => Bound::Unbounded,
    }
}

fn float_bound(value: Option<&FilterValue>) -> Bound<f64> {
    match value {
        Some(FilterValue::Float(x)) => Bound::Included(*x),
        Some(FilterValue::Integer(i)) => Bound::Included(*i as f64),
        _ => Bound::Unbounded,
    }
}
