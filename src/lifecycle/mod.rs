//! Index lifecycle: startup, full rebuilds, incremental updates and
//! atomic publication
//!
//! ```text
//! Empty ──start()──> Rebuilding ──ok──> Active ──rebuild()──> Rebuilding ...
//!   │                    └─failed/cancelled─> previous state
//!   └──────── any state ──SearchUnavailable──> Degraded ──next good query──> Active
//! ```

mod cancel;
mod engine;
mod feed;
mod source;
mod state;

pub use cancel::CancellationToken;
pub use engine::SearchEngine;
pub use feed::{FeedOp, FeedWorker};
pub use source::{DocumentSource, InMemorySource, SourceBatches, SourceRecord};
pub use state::{EngineState, HealthReport, ReindexRequest};
