use crossbeam::channel::{self, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::engine::SearchEngine;
use crate::error::{MediadexError, Result};
use crate::models::{DocumentId, FieldMap};

/// A mutation delivered by the ingestion feed
#[derive(Clone, Debug)]
pub enum FeedOp {
    Upsert { id: DocumentId, fields: FieldMap },
    Delete { id: DocumentId },
}

/// Background thread applying feed operations to the engine in arrival
/// order
pub struct FeedWorker {
    tx: Option<Sender<FeedOp>>,
    join: Option<thread::JoinHandle<()>>,
    engine: Arc<SearchEngine>,
    applied: Arc<AtomicU64>,
    applied_cv: Arc<(Mutex<()>, Condvar)>,
}

impl FeedWorker {
    pub fn spawn(engine: Arc<SearchEngine>) -> Self {
        let (tx, rx) = channel::unbounded::<FeedOp>();
        let applied = Arc::new(AtomicU64::new(0));
        let applied_cv = Arc::new((Mutex::new(()), Condvar::new()));

        let worker_engine = Arc::clone(&engine);
        let worker_applied = Arc::clone(&applied);
        let worker_cv = Arc::clone(&applied_cv);
        let join = thread::spawn(move || {
            while let Ok(op) = rx.recv() {
                let result = match &op {
                    FeedOp::Upsert { id, fields } => worker_engine
                        .upsert(id.clone(), fields.clone())
                        .map(|_| ()),
                    FeedOp::Delete { id } => worker_engine.delete(id).map(|_| ()),
                };
                if let Err(e) = result {
                    warn!(error = %e, op = ?op, "feed operation rejected");
                }

                worker_applied.fetch_add(1, Ordering::SeqCst);
                let (lock, cv) = &*worker_cv;
                let _g = lock.lock();
                cv.notify_all();
            }
            debug!("feed worker stopped");
        });

        Self {
            tx: Some(tx),
            join: Some(join),
            engine,
            applied,
            applied_cv,
        }
    }

    /// Queue an operation
    pub fn submit(&self, op: FeedOp) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(MediadexError::FeedClosed)?
            .send(op)
            .map_err(|_| MediadexError::FeedClosed)
    }

    pub fn upsert(&self, id: impl Into<DocumentId>, fields: FieldMap) -> Result<()> {
        self.submit(FeedOp::Upsert {
            id: id.into(),
            fields,
        })
    }

    pub fn delete(&self, id: impl Into<DocumentId>) -> Result<()> {
        self.submit(FeedOp::Delete { id: id.into() })
    }

    /// Operations processed so far, rejected ones included
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    /// Block until at least `count` operations have been processed
    pub fn wait_for_applied(&self, count: u64, timeout_ms: u64) -> Result<()> {
        if self.wait_until(timeout_ms, || self.applied() >= count) {
            return Ok(());
        }
        Err(MediadexError::NotReady(format!(
            "{} of {} feed operations applied",
            self.applied(),
            count
        )))
    }

    /// Block until the engine has published at least `generation`
    pub fn wait_for_generation(&self, generation: u64, timeout_ms: u64) -> Result<()> {
        if self.wait_until(timeout_ms, || self.engine.generation() >= generation) {
            return Ok(());
        }
        Err(MediadexError::NotReady(format!(
            "generation {} not reached, active is {}",
            generation,
            self.engine.generation()
        )))
    }

    fn wait_until<F>(&self, timeout_ms: u64, ready: F) -> bool
    where
        F: Fn() -> bool,
    {
        let now = Instant::now();
        let deadline = now
            .checked_add(Duration::from_millis(timeout_ms))
            .unwrap_or(now);
        let (lock, cv) = &*self.applied_cv;
        let mut guard = lock.lock();
        loop {
            if ready() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let _ = cv.wait_for(&mut guard, deadline - now);
        }
    }

    /// Stop accepting operations, drain the queue and join the thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("feed worker panicked");
            }
        }
    }
}

impl Drop for FeedWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
