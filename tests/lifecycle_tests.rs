//! Lifecycle behaviour seen through the public engine API: rebuild
//! failure and cancellation, snapshot isolation under concurrent writes,
//! and the background feed.

use std::sync::Arc;
use std::thread;

use mediadex::lifecycle::{SourceBatches, SourceRecord};
use mediadex::models::{DocumentId, FieldMap, FieldMapBuilder};
use mediadex::{
    CancellationToken, DocumentSource, EngineConfig, EngineState, FeedWorker, FieldSchema,
    InMemorySource, MediadexError, SearchEngine,
};

fn titled(title: &str) -> FieldMap {
    FieldMapBuilder::new().field("title", title).build()
}

/// Source whose stream breaks after the first batch once `fail` is set,
/// and which can cancel a token while streaming
struct ScriptedSource {
    inner: InMemorySource,
    fail: std::sync::atomic::AtomicBool,
    cancel_on_second_batch: Option<CancellationToken>,
}

impl ScriptedSource {
    fn new(titles: &[&str]) -> Self {
        let inner = InMemorySource::new();
        for (i, title) in titles.iter().enumerate() {
            inner.upsert(format!("d{}", i), titled(title));
        }
        Self {
            inner,
            fail: std::sync::atomic::AtomicBool::new(false),
            cancel_on_second_batch: None,
        }
    }
}

impl DocumentSource for ScriptedSource {
    fn latest_mutation_marker(&self) -> mediadex::Result<u64> {
        self.inner.latest_mutation_marker()
    }

    fn stream_batches(&self, batch_size: usize) -> mediadex::Result<SourceBatches<'_>> {
        let fail = self.fail.load(std::sync::atomic::Ordering::SeqCst);
        let cancel = self.cancel_on_second_batch.clone();
        let batches: Vec<mediadex::Result<Vec<SourceRecord>>> =
            self.inner.stream_batches(batch_size)?.collect();

        Ok(Box::new(batches.into_iter().enumerate().map(
            move |(i, batch)| {
                if i == 1 {
                    if let Some(token) = &cancel {
                        token.cancel();
                    }
                    if fail {
                        return Err(MediadexError::Source("connection reset".to_string()));
                    }
                }
                batch
            },
        )))
    }

    fn fetch(&self, id: &DocumentId) -> mediadex::Result<Option<FieldMap>> {
        self.inner.fetch(id)
    }
}

fn small_batches() -> EngineConfig {
    EngineConfig::default().with_rebuild_batch_size(1)
}

#[test]
fn failed_rebuild_keeps_previous_snapshot() {
    let source = Arc::new(ScriptedSource::new(&["Dune", "Arrival", "Sicario"]));
    let engine =
        SearchEngine::new(small_batches(), FieldSchema::media(), source.clone()).unwrap();
    engine.start(&CancellationToken::new()).unwrap();
    assert_eq!(engine.generation(), 1);

    source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let err = engine.rebuild(&CancellationToken::new()).unwrap_err();
    assert!(matches!(err, MediadexError::RebuildFailed(_)));
    assert!(err.is_retriable());

    let health = engine.health();
    assert_eq!(health.state, EngineState::Active);
    assert_eq!(health.snapshot_generation, 1);
    assert_eq!(health.document_count, 3);
    assert_eq!(engine.search("sicario", 10).unwrap().total_hits, 1);

    // Incremental updates still apply on top of the kept staging
    engine.upsert("d9", titled("Prisoners")).unwrap();
    assert_eq!(engine.snapshot().document_count(), 4);
}

#[test]
fn failed_first_rebuild_stays_empty() {
    let source = Arc::new(ScriptedSource::new(&["Dune", "Arrival"]));
    source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let engine = SearchEngine::new(small_batches(), FieldSchema::media(), source).unwrap();

    assert!(engine.start(&CancellationToken::new()).is_err());
    assert_eq!(engine.state(), EngineState::Empty);
    assert_eq!(engine.generation(), 0);
}

#[test]
fn rebuild_cancelled_between_batches() {
    let cancel = CancellationToken::new();
    let mut scripted = ScriptedSource::new(&["Dune", "Arrival", "Sicario"]);
    scripted.cancel_on_second_batch = Some(cancel.clone());
    let engine =
        SearchEngine::new(small_batches(), FieldSchema::media(), Arc::new(scripted)).unwrap();

    let err = engine.start(&cancel).unwrap_err();
    assert!(matches!(err, MediadexError::Cancelled));
    assert_eq!(engine.state(), EngineState::Empty);
    assert_eq!(engine.snapshot().document_count(), 0);

    // A retry starts from scratch
    engine.start(&CancellationToken::new()).unwrap();
    assert_eq!(engine.snapshot().document_count(), 3);
}

#[test]
fn cancelled_query_is_not_run() {
    let source = Arc::new(ScriptedSource::new(&["Dune"]));
    let engine = SearchEngine::new(small_batches(), FieldSchema::media(), source).unwrap();
    engine.start(&CancellationToken::new()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine.search_with_cancel("dune", 10, &cancel).unwrap_err();
    assert!(matches!(err, MediadexError::Cancelled));
    assert_eq!(engine.state(), EngineState::Active);
}

#[test]
fn readers_see_whole_snapshots_during_writes() {
    let engine = Arc::new(
        SearchEngine::new(
            EngineConfig::default(),
            FieldSchema::media(),
            Arc::new(InMemorySource::new()),
        )
        .unwrap(),
    );
    engine.start(&CancellationToken::new()).unwrap();
    let base = engine.generation();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..200 {
                engine.upsert(format!("d{}", i), titled("Dune")).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    let response = engine.search("dune", 500).unwrap();
                    // One document per generation past the empty rebuild
                    assert_eq!(response.total_hits, response.generation - base);
                    assert_eq!(response.hits.len() as u64, response.total_hits);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(engine.snapshot().document_count(), 200);
}

#[test]
fn feed_worker_publishes_in_order() {
    let engine = Arc::new(
        SearchEngine::new(
            EngineConfig::default(),
            FieldSchema::media(),
            Arc::new(InMemorySource::new()),
        )
        .unwrap(),
    );
    let feed = FeedWorker::spawn(Arc::clone(&engine));

    for i in 0..10 {
        feed.upsert(format!("s{}", i), titled(&format!("Season {}", i)))
            .unwrap();
    }
    feed.delete("s3").unwrap();
    feed.wait_for_generation(11, 5_000).unwrap();

    assert_eq!(engine.snapshot().document_count(), 9);
    assert_eq!(engine.search("season", 50).unwrap().total_hits, 9);
    assert_eq!(engine.state(), EngineState::Active);

    feed.shutdown();
}
