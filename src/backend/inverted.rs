use std::sync::atomic::{AtomicBool, Ordering};

use super::capability::CapabilitySet;
use super::evaluator::{Evaluator, TermMode};
use super::{BackendError, CandidateSet, SearchBackend};
use crate::config::FuzzyConfig;
use crate::index::IndexSnapshot;
use crate::query::QueryNode;

/// Token-postings backend supporting every capability
pub struct InvertedBackend {
    fuzzy: FuzzyConfig,
    available: AtomicBool,
}

impl InvertedBackend {
    pub const NAME: &'static str = "inverted";

    pub fn new(fuzzy: FuzzyConfig) -> Self {
        Self {
            fuzzy,
            available: AtomicBool::new(true),
        }
    }
}

impl SearchBackend for InvertedBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
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
        Ok(Evaluator::new(snapshot, self.capabilities(), &self.fuzzy, TermMode::Token).run(ast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use std::sync::Arc;

    #[test]
    fn test_unavailable_backend_refuses() {
        let backend = InvertedBackend::new(FuzzyConfig::default());
        let snapshot = IndexSnapshot::empty(Arc::new(FieldSchema::media()));
        let ast = QueryNode::Term("batman".to_string());

        assert!(backend.execute(&ast, &snapshot).is_ok());
        backend.set_available(false);
        assert_eq!(
            backend.execute(&ast, &snapshot).unwrap_err(),
            BackendError::Unavailable("inverted".to_string())
        );
    }
}
