//! Search backends behind a capability-negotiated execution contract
//!
//! # Architecture
//!
//! - `SearchBackend`: executes an AST against a snapshot, declaring the
//!   capabilities it supports
//! - `Evaluator`: shared AST walker that degrades missing capabilities
//!   deterministically
//! - `InvertedBackend` / `SubstringBackend`: the built-in backends
//! - `BackendChain`: ordered fallback across backends

mod capability;
mod chain;
mod evaluator;
pub mod fuzzy;
mod inverted;
mod substring;

pub use capability::{required_capabilities, Capability, CapabilitySet};
pub use chain::{BackendChain, ChainOutcome};
pub use evaluator::{fuzzy_quality, Evaluator, TermMode, WILDCARD_QUALITY};
pub use inverted::InvertedBackend;
pub use substring::SubstringBackend;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::MediadexError;
use crate::index::IndexSnapshot;
use crate::query::QueryNode;

/// Built-in backend selector, as named in configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Token postings with every capability
    Inverted,
    /// Substring matching over the term dictionary
    Substring,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Inverted => "inverted",
            BackendKind::Substring => "substring",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = MediadexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inverted" => Ok(BackendKind::Inverted),
            "substring" => Ok(BackendKind::Substring),
            other => Err(MediadexError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Failure of a single backend; the chain moves on to the next one
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend {0} is unavailable")]
    Unavailable(String),

    #[error("transient failure in backend {backend}: {reason}")]
    Transient { backend: String, reason: String },
}

/// How well one scoring leaf matched one document
#[derive(Clone, Debug, PartialEq)]
pub struct LeafMatch {
    /// 1.0 exact, 0.9 wildcard, `1 / (1 + d)` for a typo at distance `d`,
    /// the covered fraction for substring matches
    pub quality: f32,
    /// Matched token occurrences
    pub occurrences: u32,
    pub fields: BTreeSet<String>,
}

impl LeafMatch {
    pub fn new(quality: f32, occurrences: u32, fields: impl IntoIterator<Item = String>) -> Self {
        Self {
            quality,
            occurrences,
            fields: fields.into_iter().collect(),
        }
    }

    /// Fold another match of the same leaf into this one
    pub fn merge(&mut self, other: LeafMatch) {
        self.quality = self.quality.max(other.quality);
        self.occurrences += other.occurrences;
        self.fields.extend(other.fields);
    }
}

/// Per-document match metadata, one slot per positive scoring leaf in
/// query order
pub type MatchMetadata = Vec<Option<LeafMatch>>;

/// Result of executing a query on one backend
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    pub docs: RoaringBitmap,
    pub matches: HashMap<u32, MatchMetadata>,
    /// Set when any clause was loosened for a missing capability
    pub best_effort: bool,
    pub degraded: CapabilitySet,
}

impl CandidateSet {
    pub fn len(&self) -> u64 {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Match metadata for a candidate; empty slots when the document
    /// matched through filters only
    pub fn metadata(&self, docno: u32) -> &[Option<LeafMatch>] {
        self.matches.get(&docno).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A search backend
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> CapabilitySet;

    /// Whether the backend currently accepts queries
    fn is_available(&self) -> bool {
        true
    }

    /// Operator switch for taking the backend in or out of service
    fn set_available(&self, _available: bool) {}

    fn execute(
        &self,
        ast: &QueryNode,
        snapshot: &IndexSnapshot,
    ) -> Result<CandidateSet, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_names() {
        assert_eq!("Inverted".parse::<BackendKind>().unwrap(), BackendKind::Inverted);
        assert_eq!(" substring ".parse::<BackendKind>().unwrap(), BackendKind::Substring);
        assert!("whoosh".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Substring.to_string(), "substring");
    }

    #[test]
    fn test_leaf_match_merge() {
        let mut a = LeafMatch::new(0.5, 1, ["title".to_string()]);
        a.merge(LeafMatch::new(1.0, 2, ["tags".to_string()]));
        assert_eq!(a.quality, 1.0);
        assert_eq!(a.occurrences, 3);
        assert_eq!(a.fields.len(), 2);
    }
}
