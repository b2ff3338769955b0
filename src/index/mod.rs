//! In-memory inverted index
//!
//! # Architecture
//!
//! - `StagingIndex`: mutable index owned by the single writer
//! - `IndexSnapshot`: immutable, versioned copy that queries read
//! - `SnapshotHolder`: active snapshot behind an `ArcSwap`
//! - `TermDictionary` / `FieldTables`: postings and per-field value tables
//! - `PersistedSnapshot`: bincode form written across restarts

mod docvalues;
mod holder;
mod postings;
mod snapshot;
mod staging;
mod store;

pub use docvalues::{date_key, FieldTables};
pub use holder::SnapshotHolder;
pub use postings::{DocTermInfo, TermDictionary, TermPosting};
pub use snapshot::{IndexSnapshot, PersistedSnapshot, SNAPSHOT_VERSION};
pub use staging::StagingIndex;
pub use store::{DocEntry, IndexStore, TITLE_FIELD};
