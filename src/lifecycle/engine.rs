use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::cancel::CancellationToken;
use super::source::DocumentSource;
use super::state::{EngineState, HealthReport, ReindexRequest};
use crate::backend::BackendChain;
use crate::config::EngineConfig;
use crate::error::{MediadexError, Result};
use crate::index::{IndexSnapshot, PersistedSnapshot, SnapshotHolder, StagingIndex};
use crate::models::{current_timestamp_millis, Document, DocumentId, FieldMap, SearchResponse};
use crate::query;
use crate::ranking::Ranker;
use crate::schema::FieldSchema;
use crate::tokenizer::Tokenizer;

/// Writer-side state, only touched under the writer mutex
struct Writer {
    staging: StagingIndex,
    /// Last indexing timestamp handed out; timestamps never go backwards
    last_indexed_at: i64,
}

impl Writer {
    fn next_timestamp(&mut self) -> i64 {
        advance_clock(&mut self.last_indexed_at)
    }
}

fn advance_clock(last: &mut i64) -> i64 {
    *last = current_timestamp_millis().max(*last + 1);
    *last
}

/// Search engine: owns the active snapshot, the single writer, the backend
/// chain and the ranker.
///
/// Queries load the active snapshot once and use it to the end, so they
/// never block the writer and never see a half-applied update.
pub struct SearchEngine {
    config: EngineConfig,
    schema: Arc<FieldSchema>,
    tokenizer: Tokenizer,
    holder: SnapshotHolder,
    writer: Mutex<Writer>,
    chain: BackendChain,
    ranker: Ranker,
    source: Arc<dyn DocumentSource>,
    state: RwLock<EngineState>,
}

impl SearchEngine {
    /// Engine with the backend chain named in `config`
    pub fn new(
        config: EngineConfig,
        schema: FieldSchema,
        source: Arc<dyn DocumentSource>,
    ) -> Result<Self> {
        let chain = BackendChain::from_kinds(&config.backends, &config.fuzzy);
        Self::with_chain(config, schema, source, chain)
    }

    /// Engine with a caller-assembled backend chain
    pub fn with_chain(
        config: EngineConfig,
        schema: FieldSchema,
        source: Arc<dyn DocumentSource>,
        chain: BackendChain,
    ) -> Result<Self> {
        config.validate()?;
        if chain.backends().is_empty() {
            return Err(MediadexError::Config(
                "backend chain must name at least one backend".to_string(),
            ));
        }

        let schema = Arc::new(schema);
        let tokenizer = Tokenizer::new(&config.tokenizer);
        let ranker = Ranker::new(&config.boosts, tokenizer.clone());
        let staging = StagingIndex::new(Arc::clone(&schema), tokenizer.clone());

        Ok(Self {
            holder: SnapshotHolder::new(IndexSnapshot::empty(Arc::clone(&schema))),
            writer: Mutex::new(Writer {
                staging,
                last_indexed_at: 0,
            }),
            config,
            schema,
            tokenizer,
            chain,
            ranker,
            source,
            state: RwLock::new(EngineState::Empty),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn chain(&self) -> &BackendChain {
        &self.chain
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// The active snapshot
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.holder.load()
    }

    pub fn generation(&self) -> u64 {
        self.holder.generation()
    }

    /// Operator switch for one backend. Returns false for an unknown name.
    pub fn set_backend_available(&self, name: &str, available: bool) -> bool {
        let known = self.chain.set_available(name, available);
        if known {
            info!(backend = name, available, "backend availability changed");
        }
        known
    }

    pub fn health(&self) -> HealthReport {
        let snapshot = self.holder.load();
        HealthReport {
            state: self.state(),
            active_backend: self.chain.active_backend().map(str::to_string),
            snapshot_generation: snapshot.generation(),
            document_count: snapshot.document_count(),
        }
    }

    /// Bring the engine out of `Empty`: restore the persisted snapshot when
    /// it is fresh enough, otherwise rebuild from the canonical store.
    pub fn start(&self, cancel: &CancellationToken) -> Result<()> {
        if let Some(path) = self.config.snapshot_path.as_deref() {
            match PersistedSnapshot::load(path) {
                Ok(Some(persisted)) => {
                    let latest = match self.source.latest_mutation_marker() {
                        Ok(latest) => latest,
                        Err(e) => {
                            warn!(error = %e, "cannot check snapshot staleness, rebuilding");
                            return self.rebuild(cancel);
                        }
                    };
                    let lag = latest.saturating_sub(persisted.source_marker);
                    if lag <= self.config.staleness_threshold {
                        self.restore(persisted);
                        return Ok(());
                    }
                    info!(
                        lag,
                        threshold = self.config.staleness_threshold,
                        "persisted snapshot is stale, rebuilding"
                    );
                }
                Ok(None) => info!(path = %path.display(), "no persisted snapshot, rebuilding"),
                Err(e) => warn!(error = %e, "cannot load persisted snapshot, rebuilding"),
            }
        }
        self.rebuild(cancel)
    }

    fn restore(&self, persisted: PersistedSnapshot) {
        let mut writer = self.writer.lock();
        let mut staging = StagingIndex::new(Arc::clone(&self.schema), self.tokenizer.clone());
        let mut last_indexed_at = writer.last_indexed_at;
        for doc in persisted.documents {
            last_indexed_at = last_indexed_at.max(doc.indexed_at);
            staging.insert(doc);
        }

        let snapshot = staging.snapshot(persisted.generation, persisted.source_marker);
        writer.staging = staging;
        writer.last_indexed_at = last_indexed_at;
        self.publish(snapshot);
        self.transition(EngineState::Active);
    }

    /// Full rebuild from the canonical store.
    ///
    /// The fresh staging index is only published once every batch has been
    /// read; a failed or cancelled rebuild leaves the active snapshot and
    /// the writer's staging untouched.
    pub fn rebuild(&self, cancel: &CancellationToken) -> Result<()> {
        let mut writer = self.writer.lock();
        let previous = self.transition(EngineState::Rebuilding);
        let started = Instant::now();

        match self.build_fresh(&writer, cancel) {
            Ok((staging, last_indexed_at, marker)) => {
                let generation = self.holder.generation() + 1;
                let snapshot = staging.snapshot(generation, marker);
                writer.staging = staging;
                writer.last_indexed_at = last_indexed_at;
                self.publish(snapshot);
                self.finish_rebuild(EngineState::Active);
                info!(
                    generation,
                    documents = writer.staging.len(),
                    took_ms = started.elapsed().as_millis() as u64,
                    "rebuild complete"
                );
                drop(writer);
                self.persist_logged();
                Ok(())
            }
            Err(MediadexError::Cancelled) => {
                self.finish_rebuild(previous);
                info!("rebuild cancelled, keeping previous snapshot");
                Err(MediadexError::Cancelled)
            }
            Err(e) => {
                self.finish_rebuild(previous);
                error!(error = %e, "rebuild failed, keeping previous snapshot");
                Err(MediadexError::RebuildFailed(e.to_string()))
            }
        }
    }

    fn build_fresh(
        &self,
        writer: &Writer,
        cancel: &CancellationToken,
    ) -> Result<(StagingIndex, i64, u64)> {
        // Read the marker first: mutations racing with the stream count as
        // unseen, which only makes the next staleness check stricter.
        let marker = self.source.latest_mutation_marker()?;
        let mut fresh = StagingIndex::new(Arc::clone(&self.schema), self.tokenizer.clone());
        let mut clock = writer.last_indexed_at;

        for batch in self.source.stream_batches(self.config.rebuild_batch_size)? {
            if cancel.is_cancelled() {
                return Err(MediadexError::Cancelled);
            }
            for (id, fields) in batch? {
                let fields = match self.schema.coerce(fields) {
                    Ok(fields) => fields,
                    Err(reason) => {
                        warn!(id = %id, %reason, "skipping invalid record");
                        continue;
                    }
                };
                // Unchanged records keep their timestamp so a repeated full
                // rebuild reproduces the same ordering
                let indexed_at = match writer.staging.get(&id) {
                    Some(existing) if existing.fields == fields => existing.indexed_at,
                    _ => advance_clock(&mut clock),
                };
                fresh.insert(Document::new(id, fields, indexed_at));
            }
            debug!(documents = fresh.len(), "rebuild batch applied");
        }
        if cancel.is_cancelled() {
            return Err(MediadexError::Cancelled);
        }

        Ok((fresh, clock, marker))
    }

    /// Index or replace one record and publish. Returns the new generation.
    pub fn upsert(&self, id: impl Into<DocumentId>, fields: FieldMap) -> Result<u64> {
        let id = id.into();
        let fields = self
            .schema
            .coerce(fields)
            .map_err(|reason| MediadexError::InvalidDocument {
                id: id.to_string(),
                reason,
            })?;

        let mut writer = self.writer.lock();
        let indexed_at = writer.next_timestamp();
        writer
            .staging
            .insert(Document::new(id.clone(), fields, indexed_at));
        let generation = self.publish_staging(&writer);
        debug!(id = %id, generation, "document upserted");
        Ok(generation)
    }

    /// Remove one record. Returns whether it was indexed; nothing is
    /// published when it was not.
    pub fn delete(&self, id: &DocumentId) -> Result<bool> {
        let mut writer = self.writer.lock();
        if !writer.staging.remove(id) {
            return Ok(false);
        }
        let generation = self.publish_staging(&writer);
        debug!(id = %id, generation, "document deleted");
        Ok(true)
    }

    /// Rebuild everything, or refresh a single record from the source
    pub fn reindex(&self, request: ReindexRequest, cancel: &CancellationToken) -> Result<u64> {
        match request {
            ReindexRequest::Full => self.rebuild(cancel).map(|_| self.generation()),
            ReindexRequest::SingleDocument(id) => match self.source.fetch(&id)? {
                Some(fields) => self.upsert(id, fields),
                None => {
                    self.delete(&id)?;
                    Ok(self.generation())
                }
            },
        }
    }

    /// Search with a fresh cancellation token
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        self.search_with_cancel(query, limit, &CancellationToken::new())
    }

    /// Parse, execute on the backend chain and rank, all against the
    /// snapshot active when the call started
    pub fn search_with_cancel(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        let snapshot = self.holder.load();
        let ast = query::parse_with_tokenizer(
            query,
            snapshot.schema(),
            &self.tokenizer,
            self.config.query_limits,
        )?;

        if ast.is_empty() {
            let backend = self.chain.active_backend().unwrap_or_default();
            return Ok(SearchResponse::empty(backend, snapshot.generation()));
        }

        let outcome = match self.chain.execute(&ast, &snapshot, cancel) {
            Ok(outcome) => outcome,
            Err(e @ MediadexError::SearchUnavailable { .. }) => {
                self.mark_degraded();
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.mark_recovered();

        let ranked = self
            .ranker
            .rank(&snapshot, &ast, &outcome.candidates, limit);
        Ok(SearchResponse {
            hits: ranked.hits,
            total_hits: ranked.total_hits,
            best_effort: outcome.candidates.best_effort,
            backend: outcome.backend,
            generation: snapshot.generation(),
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Write the active snapshot to the configured path, if any
    pub fn persist(&self) -> Result<()> {
        match self.config.snapshot_path.as_deref() {
            Some(path) => self.persist_to(path),
            None => Ok(()),
        }
    }

    fn persist_to(&self, path: &Path) -> Result<()> {
        let snapshot = self.holder.load();
        snapshot.to_persisted().save(path)?;
        info!(
            path = %path.display(),
            generation = snapshot.generation(),
            "snapshot persisted"
        );
        Ok(())
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist snapshot");
        }
    }

    /// Publish the writer's staging as the next generation
    fn publish_staging(&self, writer: &Writer) -> u64 {
        let current = self.holder.load();
        let generation = current.generation() + 1;
        self.publish(writer.staging.snapshot(generation, current.source_marker()));
        self.transition_from(EngineState::Empty, EngineState::Active);
        generation
    }

    fn publish(&self, snapshot: IndexSnapshot) {
        let generation = snapshot.generation();
        let documents = snapshot.document_count();
        self.holder.store(snapshot);
        debug!(generation, documents, "snapshot published");
    }

    /// Move to `next`, returning the state left behind
    fn transition(&self, next: EngineState) -> EngineState {
        let mut state = self.state.write();
        let previous = *state;
        if previous != next {
            *state = next;
            info!(from = %previous, to = %next, "engine state changed");
        }
        previous
    }

    /// Move to `next` only while the state is still `expected`
    fn transition_from(&self, expected: EngineState, next: EngineState) -> bool {
        let mut state = self.state.write();
        if *state != expected {
            return false;
        }
        if expected != next {
            *state = next;
            info!(from = %expected, to = %next, "engine state changed");
        }
        true
    }

    /// Leave `Rebuilding` for `next`, unless a query moved the engine to
    /// `Degraded` meanwhile
    fn finish_rebuild(&self, next: EngineState) {
        if !self.transition_from(EngineState::Rebuilding, next) {
            debug!(state = %self.state(), "state changed during rebuild, keeping it");
        }
    }

    fn mark_degraded(&self) {
        let mut state = self.state.write();
        if *state != EngineState::Degraded {
            warn!(from = %*state, "search unavailable, engine degraded");
            *state = EngineState::Degraded;
        }
    }

    fn mark_recovered(&self) {
        let mut state = self.state.write();
        if *state == EngineState::Degraded {
            let next = if self.holder.generation() == 0 {
                EngineState::Empty
            } else {
                EngineState::Active
            };
            info!(to = %next, "search recovered");
            *state = next;
        }
    }
}
