use std::sync::atomic::{AtomicBool, Ordering};

use super::capability::{Capability, CapabilitySet};
use super::evaluator::{Evaluator, TermMode};
use super::{BackendError, CandidateSet, SearchBackend};
use crate::config::FuzzyConfig;
use crate::index::IndexSnapshot;
use crate::query::QueryNode;

/// Basic backend: substring matching over the term dictionary, boolean
/// combinators and exact filters only. Phrases, wildcards, ranges and typo
/// tolerance degrade.
pub struct SubstringBackend {
    fuzzy: FuzzyConfig,
    available: AtomicBool,
}

impl SubstringBackend {
    pub const NAME: &'static str = "substring";

    pub fn new(fuzzy: FuzzyConfig) -> Self {
        Self {
            fuzzy,
            available: AtomicBool::new(true),
        }
    }
}

impl SearchBackend for SubstringBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::Exact, Capability::Boolean])
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn execute(
        &self,
        ast: &QueryNode,
        snapshot: &IndexSnapshot,
    ) -> Result<CandidateSet, BackendError> {
        if !self.is_available() {
            return Err(BackendError::Unavailable(Self::NAME.to_string()));
        }
        Ok(Evaluator::new(snapshot, self.capabilities(), &self.fuzzy, TermMode::Substring).run(ast))
    }
}
