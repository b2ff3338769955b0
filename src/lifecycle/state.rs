use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the search engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Nothing has been published yet
    Empty,
    /// A full rebuild is running; the previous snapshot keeps serving
    Rebuilding,
    Active,
    /// The whole backend chain failed on the last query
    Degraded,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Empty => "empty",
            EngineState::Rebuilding => "rebuilding",
            EngineState::Active => "active",
            EngineState::Degraded => "degraded",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health of the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub state: EngineState,
    /// First backend in the chain currently accepting queries
    pub active_backend: Option<String>,
    pub snapshot_generation: u64,
    pub document_count: usize,
}

/// What `reindex` should rebuild
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReindexRequest {
    /// Rebuild everything from the canonical store
    Full,
    /// Refresh one record from the canonical store; a record that no
    /// longer exists is removed from the index
    SingleDocument(crate::models::DocumentId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_report_json() {
        let report = HealthReport {
            state: EngineState::Degraded,
            active_backend: None,
            snapshot_generation: 4,
            document_count: 12,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "degraded");
        assert_eq!(json["snapshot_generation"], 4);
        assert!(json["active_backend"].is_null());
    }
}
