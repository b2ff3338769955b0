pub mod backend;
pub mod config;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod models;
pub mod query;
pub mod ranking;
pub mod schema;
pub mod tokenizer;

pub use backend::{BackendChain, BackendKind, Capability, CapabilitySet, SearchBackend};
pub use config::{BoostConfig, EngineConfig, FuzzyConfig, QueryLimits, TokenizerConfig};
pub use error::{MediadexError, ParseError, Result};
pub use lifecycle::{
    CancellationToken, DocumentSource, EngineState, FeedOp, FeedWorker, HealthReport,
    InMemorySource, ReindexRequest, SearchEngine,
};
pub use models::*;
pub use query::{parse, QueryNode};
pub use schema::{FieldMapping, FieldSchema, FieldType};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
