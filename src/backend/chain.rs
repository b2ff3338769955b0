use std::sync::Arc;
use tracing::{debug, error, warn};

use super::inverted::InvertedBackend;
use super::substring::SubstringBackend;
use super::{required_capabilities, BackendKind, CandidateSet, CapabilitySet, SearchBackend};
use crate::config::FuzzyConfig;
use crate::error::{MediadexError, Result};
use crate::index::IndexSnapshot;
use crate::lifecycle::CancellationToken;
use crate::query::QueryNode;

/// Candidates plus the backend that produced them
#[derive(Debug)]
pub struct ChainOutcome {
    pub candidates: CandidateSet,
    pub backend: String,
    /// Capabilities the query needs that the serving backend lacks
    pub missing: CapabilitySet,
}

/// Ordered fallback across backends, primary first.
///
/// Each backend is tried at most once per query; unavailability and
/// transient errors move on to the next one.
pub struct BackendChain {
    backends: Vec<Arc<dyn SearchBackend>>,
}

impl BackendChain {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        Self { backends }
    }

    /// Chain of built-in backends in the given order
    pub fn from_kinds(kinds: &[BackendKind], fuzzy: &FuzzyConfig) -> Self {
        let backends = kinds
            .iter()
            .map(|kind| -> Arc<dyn SearchBackend> {
                match kind {
                    BackendKind::Inverted => Arc::new(InvertedBackend::new(fuzzy.clone())),
                    BackendKind::Substring => Arc::new(SubstringBackend::new(fuzzy.clone())),
                }
            })
            .collect();
        Self::new(backends)
    }

    pub fn backends(&self) -> &[Arc<dyn SearchBackend>] {
        &self.backends
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SearchBackend>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// Operator switch. Returns false when no backend has that name.
    pub fn set_available(&self, name: &str, available: bool) -> bool {
        match self.get(name) {
            Some(backend) => {
                backend.set_available(available);
                true
            }
            None => false,
        }
    }

    /// First backend currently accepting queries
    pub fn active_backend(&self) -> Option<&str> {
        self.backends
            .iter()
            .find(|b| b.is_available())
            .map(|b| b.name())
    }

    /// Run `ast` on the first backend that succeeds
    pub fn execute(
        &self,
        ast: &QueryNode,
        snapshot: &IndexSnapshot,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome> {
        let mut attempted = Vec::with_capacity(self.backends.len());
        let required = required_capabilities(ast);

        for backend in &self.backends {
            if cancel.is_cancelled() {
                return Err(MediadexError::Cancelled);
            }
            attempted.push(backend.name().to_string());

            if !backend.is_available() {
                warn!(backend = backend.name(), "backend unavailable, falling back");
                continue;
            }

            let missing = required.difference(backend.capabilities());
            if !missing.is_empty() {
                debug!(
                    backend = backend.name(),
                    required = %required,
                    missing = %missing,
                    "backend lacks capabilities, query will degrade"
                );
            }

            match backend.execute(ast, snapshot) {
                Ok(candidates) => {
                    if candidates.best_effort {
                        debug!(
                            backend = backend.name(),
                            degraded = %candidates.degraded,
                            "query executed best-effort"
                        );
                    }
                    return Ok(ChainOutcome {
                        candidates,
                        backend: backend.name().to_string(),
                        missing,
                    });
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "backend failed, falling back");
                }
            }
        }

        error!(attempted = ?attempted, "all search backends failed");
        Err(MediadexError::SearchUnavailable { attempted })
    }
}
