pub mod document;
pub mod search;

pub use document::{
    current_timestamp_millis, Document, DocumentId, FieldMap, FieldMapBuilder, FieldValue,
};
pub use search::{MatchExplanation, SearchHit, SearchResponse};
