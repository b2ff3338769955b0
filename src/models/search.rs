use serde::{Deserialize, Serialize};

use super::document::DocumentId;

/// Why a document matched and how its score was adjusted
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchExplanation {
    /// Fields in which query terms were found, sorted
    pub matched_fields: Vec<String>,
    /// Relevance before domain boosts, in [0, 1]
    pub base_score: f32,
    /// Boosts applied, in application order, as (name, factor)
    pub boosts: Vec<(String, f32)>,
}

/// Search hit with relevance score
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocumentId,
    pub score: f32,
    pub explanation: MatchExplanation,
}

impl SearchHit {
    pub fn new(doc_id: DocumentId, score: f32) -> Self {
        Self {
            doc_id,
            score,
            explanation: MatchExplanation::default(),
        }
    }

    pub fn with_explanation(mut self, explanation: MatchExplanation) -> Self {
        self.explanation = explanation;
        self
    }
}

/// Ranked response for one query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Matches before truncation to the caller's limit
    pub total_hits: u64,
    /// Set when a backend lacked a capability the query needed and the
    /// affected clauses were loosened
    pub best_effort: bool,
    /// Backend that served the query
    pub backend: String,
    /// Generation of the snapshot the query was bound to
    pub generation: u64,
    pub took_ms: u64,
}

impl SearchResponse {
    /// Zero-result response, used for the empty query
    pub fn empty(backend: impl Into<String>, generation: u64) -> Self {
        Self {
            hits: Vec::new(),
            total_hits: 0,
            best_effort: false,
            backend: backend.into(),
            generation,
            took_ms: 0,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.doc_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_hit_builder() {
        let hit = SearchHit::new(DocumentId::from("m1"), 0.95).with_explanation(MatchExplanation {
            matched_fields: vec!["title".to_string()],
            base_score: 0.5,
            boosts: vec![("quality".to_string(), 1.2)],
        });
        assert_eq!(hit.doc_id.as_str(), "m1");
        assert_eq!(hit.score, 0.95);
        assert_eq!(hit.explanation.matched_fields, vec!["title"]);
    }

    #[test]
    fn test_empty_response() {
        let response = SearchResponse::empty("inverted", 3);
        assert!(response.hits.is_empty());
        assert_eq!(response.total_hits, 0);
        assert_eq!(response.generation, 3);
        assert!(!response.best_effort);
    }
}
