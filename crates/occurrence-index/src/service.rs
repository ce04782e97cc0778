//! Batching and commit protocol over an index backend.
//!
//! Documents accumulate under a mutex-guarded batch. A full batch, or a
//! caller-requested commit point, flushes via `add_docs`; every
//! `hard_commit_size` flushed documents trigger a hard commit. A lost
//! batch is logged and the pipeline keeps going; the caller can reindex
//! from its modification watermark.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::backend::IndexBackend;
use crate::builder::DocBuilder;
use crate::document::{DocPool, RecycleDoc, SearchDocument};
use crate::error::IndexError;
use crate::schema::IndexSchema;

struct BatchState {
    batch: Vec<RecycleDoc>,
    current_commit_size: usize,
}

/// Thread-safe batching service shared by all document builders.
pub struct IndexService {
    backend: Arc<dyn IndexBackend>,
    schema: Arc<IndexSchema>,
    pool: Arc<DocPool>,
    batch_size: usize,
    hard_commit_size: usize,
    state: Mutex<BatchState>,
}

impl IndexService {
    /// `worker_hint` sizes the document pool: the pool must always exceed
    /// the batch size or producers would deadlock waiting for a flush that
    /// can only happen on the next add.
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        schema: Arc<IndexSchema>,
        batch_size: usize,
        hard_commit_size: usize,
        worker_hint: usize,
    ) -> Arc<Self> {
        let batch_size = batch_size.max(1);
        let pool_capacity = batch_size + worker_hint.max(1) * 2;
        Arc::new(Self {
            backend,
            schema,
            pool: Arc::new(DocPool::new(pool_capacity)),
            batch_size,
            hard_commit_size: hard_commit_size.max(batch_size),
            state: Mutex::new(BatchState {
                batch: Vec::with_capacity(batch_size),
                current_commit_size: 0,
            }),
        })
    }

    /// A new builder feeding this service. One per producer thread.
    pub fn builder(self: &Arc<Self>) -> DocBuilder {
        DocBuilder::new(self.clone())
    }

    pub fn schema(&self) -> &Arc<IndexSchema> {
        &self.schema
    }

    pub(crate) fn pool(&self) -> &Arc<DocPool> {
        &self.pool
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.backend
    }

    /// Enqueue a built document. Flushes at `batch_size`; `commit = true`
    /// forces a flush and a hard commit.
    pub fn add_doc(&self, doc: RecycleDoc, commit: bool) -> Result<(), IndexError> {
        let mut state = self.lock_state()?;

        state.batch.push(doc);
        if state.batch.len() >= self.batch_size || commit {
            self.flush_locked(&mut state);
        }
        if commit || state.current_commit_size >= self.hard_commit_size {
            self.hard_commit_locked(&mut state);
        }
        Ok(())
    }

    /// Flush the residual batch, hard-commit, optionally optimize and
    /// shut the backend down. The only clean shutdown path.
    pub fn finalise(&self, optimise: bool, shutdown: bool) -> Result<(), IndexError> {
        {
            let mut state = self.lock_state()?;
            self.flush_locked(&mut state);
            self.hard_commit_locked(&mut state);
        }
        if optimise {
            info!("Optimizing index");
            self.backend.optimize()?;
        }
        if shutdown {
            self.backend.shutdown()?;
        }
        Ok(())
    }

    /// Flush the current batch without committing (non-batched adds).
    pub fn flush(&self) -> Result<(), IndexError> {
        let mut state = self.lock_state()?;
        self.flush_locked(&mut state);
        Ok(())
    }

    /// Soft commit: make flushed batches visible to new searchers.
    pub fn commit(&self) -> Result<(), IndexError> {
        self.backend.commit(false)
    }

    pub fn hard_commit(&self) -> Result<(), IndexError> {
        let mut state = self.lock_state()?;
        self.hard_commit_locked(&mut state);
        Ok(())
    }

    pub fn delete_by_query(&self, query: &str) -> Result<(), IndexError> {
        self.backend.delete_by_query(query)
    }

    pub fn delete_by_field(&self, field: &str, value: &str) -> Result<(), IndexError> {
        self.backend.delete_by_field(field, value)
    }

    pub fn empty_index(&self) -> Result<(), IndexError> {
        self.backend.empty_index()
    }

    pub fn optimize(&self) -> Result<(), IndexError> {
        self.backend.optimize()
    }

    pub fn reload(&self) -> Result<(), IndexError> {
        self.backend.reload()
    }

    /// Documents currently buffered (diagnostics).
    pub fn pending(&self) -> usize {
        self.lock_state().map(|s| s.batch.len()).unwrap_or(0)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, BatchState>, IndexError> {
        self.state
            .lock()
            .map_err(|e| IndexError::Backend(format!("batch lock poisoned: {e}")))
    }

    fn flush_locked(&self, state: &mut BatchState) {
        if state.batch.is_empty() {
            return;
        }
        let docs: Vec<SearchDocument> =
            state.batch.iter().map(RecycleDoc::to_document).collect();
        let flushed = docs.len();
        if let Err(e) = self.backend.add_docs(&docs) {
            // batch is lost; reindexing from the watermark recovers it
            error!(count = flushed, error = %e, "Failed to flush batch");
        } else {
            debug!(count = flushed, "Flushed batch");
        }
        state.current_commit_size += flushed;
        for doc in state.batch.drain(..) {
            self.pool.release(doc);
        }
    }

    fn hard_commit_locked(&self, state: &mut BatchState) {
        if let Err(e) = self.backend.commit(true) {
            error!(error = %e, "Hard commit failed");
        } else {
            debug!(
                since_last = state.current_commit_size,
                "Hard commit complete"
            );
        }
        state.current_commit_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PageRequest, SearchHit};
    use crate::schema::occurrence_schema;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend double that records adds and commits.
    #[derive(Default)]
    struct RecordingBackend {
        added: Mutex<Vec<usize>>,
        max_batch: AtomicUsize,
        hard_commits: AtomicUsize,
        soft_commits: AtomicUsize,
    }

    impl IndexBackend for RecordingBackend {
        fn add_docs(&self, docs: &[SearchDocument]) -> Result<(), IndexError> {
            self.max_batch.fetch_max(docs.len(), Ordering::SeqCst);
            self.added
                .lock()
                .unwrap()
                .push(docs.len());
            Ok(())
        }

        fn commit(&self, hard: bool) -> Result<(), IndexError> {
            if hard {
                self.hard_commits.fetch_add(1, Ordering::SeqCst);
            } else {
                self.soft_commits.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn delete_by_query(&self, _query: &str) -> Result<(), IndexError> {
            Ok(())
        }

        fn optimize(&self) -> Result<(), IndexError> {
            Ok(())
        }

        fn reload(&self) -> Result<(), IndexError> {
            Ok(())
        }

        fn shutdown(&self) -> Result<(), IndexError> {
            Ok(())
        }

        fn total_count(&self, _q: &str, _f: &[String]) -> Result<u64, IndexError> {
            Ok(0)
        }

        fn facets(
            &self,
            _field: &str,
            _q: &str,
            _f: &[String],
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<(String, u64)>, IndexError> {
            Ok(Vec::new())
        }

        fn page(&self, _request: &PageRequest) -> Result<Vec<SearchHit>, IndexError> {
            Ok(Vec::new())
        }
    }

    fn service_with(
        batch_size: usize,
        hard_commit_size: usize,
    ) -> (Arc<IndexService>, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let service = IndexService::new(
            backend.clone(),
            Arc::new(occurrence_schema()),
            batch_size,
            hard_commit_size,
            1,
        );
        (service, backend)
    }

    fn doc_with_id(service: &Arc<IndexService>, id: &str) -> RecycleDoc {
        let mut doc = service.pool().acquire().unwrap();
        doc.reset();
        doc.add_value("id", id.into());
        doc
    }

    #[test]
    fn test_flush_at_batch_size() {
        let (service, backend) = service_with(3, 6);

        for i in 0..7 {
            let doc = doc_with_id(&service, &format!("r{i}"));
            service.add_doc(doc, false).unwrap();
        }

        let added = backend.added.lock().unwrap().clone();
        assert_eq!(added, vec![3, 3]);
        assert_eq!(service.pending(), 1);
        // batch never exceeded its bound
        assert!(backend.max_batch.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_hard_commit_cadence() {
        let (service, backend) = service_with(2, 4);

        for i in 0..8 {
            let doc = doc_with_id(&service, &format!("r{i}"));
            service.add_doc(doc, false).unwrap();
        }

        // 8 docs flushed in 4 batches; hard commits at >= 4 flushed, twice
        assert_eq!(backend.hard_commits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_commit_flag_forces_flush_and_hard_commit() {
        let (service, backend) = service_with(100, 1000);

        let doc = doc_with_id(&service, "r0");
        service.add_doc(doc, true).unwrap();

        assert_eq!(backend.added.lock().unwrap().clone(), vec![1]);
        assert_eq!(backend.hard_commits.load(Ordering::SeqCst), 1);
        assert_eq!(service.pending(), 0);
    }

    #[test]
    fn test_finalise_flushes_residual() {
        let (service, backend) = service_with(10, 20);

        for i in 0..4 {
            let doc = doc_with_id(&service, &format!("r{i}"));
            service.add_doc(doc, false).unwrap();
        }
        assert_eq!(service.pending(), 4);

        service.finalise(false, false).unwrap();
        assert_eq!(service.pending(), 0);
        assert_eq!(backend.added.lock().unwrap().clone(), vec![4]);
        assert!(backend.hard_commits.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_docs_return_to_pool_after_flush() {
        let (service, _backend) = service_with(1, 10);
        let capacity = service.pool().capacity();

        // run far more documents through than the pool holds
        for i in 0..capacity * 3 {
            let doc = doc_with_id(&service, &format!("r{i}"));
            service.add_doc(doc, false).unwrap();
        }
    }
}
