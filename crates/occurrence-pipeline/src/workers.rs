//! Bounded-queue worker pool for bulk document loads.
//!
//! Workers consume document batches from a bounded queue and add them to
//! the backend; only worker 0 issues commits, on the hard-commit cadence.
//! Producers block (polling) while the queue is full. Workers exit once
//! told to stop and the queue is drained.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use occurrence_index::{IndexBackend, SearchDocument};

/// Idle poll interval for both producers and workers.
const IDLE_POLL: Duration = Duration::from_millis(250);

struct WorkQueue {
    items: Mutex<VecDeque<Vec<SearchDocument>>>,
    capacity: usize,
    stop: AtomicBool,
}

impl WorkQueue {
    fn push(&self, batch: Vec<SearchDocument>) -> Result<(), Vec<SearchDocument>> {
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        if items.len() >= self.capacity {
            return Err(batch);
        }
        items.push_back(batch);
        Ok(())
    }

    fn pop(&self) -> Option<Vec<SearchDocument>> {
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.pop_front()
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Pool of add-document workers over a shared backend.
pub struct DocWorkerPool {
    queue: Arc<WorkQueue>,
    handles: Vec<JoinHandle<u64>>,
}

impl DocWorkerPool {
    /// Spawn `workers` threads. `queue_capacity` bounds in-flight batches;
    /// `hard_commit_size` sets worker 0's commit cadence in documents.
    pub fn start(
        backend: Arc<dyn IndexBackend>,
        workers: usize,
        queue_capacity: usize,
        hard_commit_size: usize,
    ) -> Self {
        let queue = Arc::new(WorkQueue {
            items: Mutex::new(VecDeque::new()),
            capacity: queue_capacity.max(1),
            stop: AtomicBool::new(false),
        });

        let workers = workers.max(1);
        let handles = (0..workers)
            .map(|worker_id| {
                let queue = queue.clone();
                let backend = backend.clone();
                std::thread::spawn(move || {
                    run_worker(worker_id, &queue, backend.as_ref(), hard_commit_size)
                })
            })
            .collect();

        info!(workers, queue_capacity, "Started document workers");
        Self { queue, handles }
    }

    /// Submit a batch, blocking while the queue is full.
    pub fn submit(&self, batch: Vec<SearchDocument>) {
        if batch.is_empty() {
            return;
        }
        let mut batch = batch;
        loop {
            match self.queue.push(batch) {
                Ok(()) => return,
                Err(returned) => {
                    batch = returned;
                    std::thread::sleep(IDLE_POLL);
                }
            }
        }
    }

    /// Signal stop, wait for the queue to drain and workers to exit.
    /// Returns the total documents added across workers.
    pub fn stop(self) -> u64 {
        self.queue.stop.store(true, Ordering::Release);
        let mut total = 0;
        for handle in self.handles {
            match handle.join() {
                Ok(count) => total += count,
                Err(_) => error!("Worker thread panicked"),
            }
        }
        info!(total, "Document workers stopped");
        total
    }
}

fn run_worker(
    worker_id: usize,
    queue: &WorkQueue,
    backend: &dyn IndexBackend,
    hard_commit_size: usize,
) -> u64 {
    let mut added = 0u64;
    let mut since_commit = 0usize;

    loop {
        match queue.pop() {
            Some(batch) => {
                let count = batch.len();
                if let Err(e) = backend.add_docs(&batch) {
                    error!(worker_id, count, error = %e, "Failed to add batch");
                } else {
                    added += count as u64;
                }
                // commits are worker 0's job
                if worker_id == 0 {
                    since_commit += count;
                    if since_commit >= hard_commit_size {
                        if let Err(e) = backend.commit(true) {
                            error!(worker_id, error = %e, "Worker commit failed");
                        }
                        since_commit = 0;
                    }
                }
            }
            None => {
                if queue.stopping() {
                    break;
                }
                std::thread::sleep(IDLE_POLL);
            }
        }
    }

    if worker_id == 0 && since_commit > 0 {
        if let Err(e) = backend.commit(true) {
            error!(error = %e, "Final worker commit failed");
        }
    }
    debug!(worker_id, added, "Worker exiting");
    added
}
