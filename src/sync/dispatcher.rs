//! Fixed-size worker pool that applies graph insertions in parallel
//!
//! Workers pull documents from one shared FIFO queue and push a `Completion`
//! per document onto a shared completion queue. Both queues are bounded: a
//! submitter waits for room in the work queue and keeps draining completions
//! while it waits. Closing the work queue is the termination signal: each
//! worker exits once it observes end-of-stream. Workers never touch counters;
//! the caller drains completions and counts.

use super::error::IndexError;
use super::traits::GraphIndex;
use super::types::{Category, Document, DocumentId};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Reference pool size
pub const DEFAULT_WORKERS: usize = 4;

/// Work queue slots per worker
pub const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Result of one insertion performed by a worker
#[derive(Debug)]
pub struct Completion {
    pub id: DocumentId,
    pub category: Category,
    pub worker: usize,
    pub result: Result<(), IndexError>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("work queue is closed")]
    QueueClosed,

    #[error("worker panicked")]
    WorkerPanicked,

    #[error("every worker exited while work was still being submitted")]
    WorkersGone,

    #[error("worker task aborted: {0}")]
    WorkerAborted(String),
}

/// Spawns worker pools bound to one graph index
#[derive(Clone)]
pub struct WorkDispatcher {
    index: Arc<dyn GraphIndex>,
    worker_count: usize,
}

impl WorkDispatcher {
    /// Create a dispatcher; a `worker_count` of zero is treated as one
    pub fn new(index: Arc<dyn GraphIndex>, worker_count: usize) -> Self {
        Self {
            index,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Insert every document and return completions in completion order
    pub async fn run(&self, documents: Vec<Document>) -> Result<Vec<Completion>, DispatchError> {
        let mut dispatch = self.start();
        for document in documents {
            dispatch.submit(document).await?;
        }
        dispatch.close();

        let mut completions = Vec::new();
        while let Some(completion) = dispatch.next().await {
            completions.push(completion);
        }
        dispatch.join().await?;
        Ok(completions)
    }

    /// Spawn the pool and return a handle for streaming submission
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Dispatch {
        let (work_tx, work_rx) =
            mpsc::channel::<Document>(self.worker_count * QUEUE_DEPTH_PER_WORKER);
        let (done_tx, done_rx) = mpsc::channel::<Completion>(self.worker_count);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let mut workers = JoinSet::new();
        for worker in 0..self.worker_count {
            workers.spawn(run_worker(
                worker,
                work_rx.clone(),
                done_tx.clone(),
                self.index.clone(),
            ));
        }
        // Only workers hold completion senders, so `next()` ends once they all exit.
        drop(done_tx);

        Dispatch {
            work_tx: Some(work_tx),
            work_rx,
            done_rx,
            ready: VecDeque::new(),
            workers,
        }
    }
}

impl std::fmt::Debug for WorkDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkDispatcher")
            .field("worker_count", &self.worker_count)
            .finish_non_exhaustive()
    }
}

/// Handle to a running worker pool
pub struct Dispatch {
    work_tx: Option<mpsc::Sender<Document>>,
    work_rx: Arc<Mutex<mpsc::Receiver<Document>>>,
    done_rx: mpsc::Receiver<Completion>,
    /// Completions drained while a submit waited for queue room
    ready: VecDeque<Completion>,
    workers: JoinSet<()>,
}

impl Dispatch {
    /// Queue a document for insertion, waiting while the work queue is full
    ///
    /// Completions that arrive in the meantime are buffered for `next`, so
    /// workers never stall on a full completion queue.
    pub async fn submit(&mut self, document: Document) -> Result<(), DispatchError> {
        let tx = self.work_tx.as_ref().ok_or(DispatchError::QueueClosed)?;
        loop {
            tokio::select! {
                permit = tx.reserve() => {
                    permit.map_err(|_| DispatchError::QueueClosed)?.send(document);
                    return Ok(());
                }
                completion = self.done_rx.recv() => match completion {
                    Some(completion) => self.ready.push_back(completion),
                    None => return Err(DispatchError::WorkersGone),
                },
            }
        }
    }

    /// Take a completion if one is ready, without waiting
    pub fn try_next(&mut self) -> Option<Completion> {
        self.ready
            .pop_front()
            .or_else(|| self.done_rx.try_recv().ok())
    }

    /// Wait for the next completion
    ///
    /// Returns `None` once every worker has exited, which only happens after
    /// `close` or `abort`.
    pub async fn next(&mut self) -> Option<Completion> {
        if let Some(completion) = self.ready.pop_front() {
            return Some(completion);
        }
        self.done_rx.recv().await
    }

    /// Signal end-of-work; workers exit after draining the queue
    pub fn close(&mut self) {
        self.work_tx = None;
    }

    /// Close the queue and discard documents no worker has picked up yet
    ///
    /// Returns how many documents were discarded. In-flight insertions still
    /// complete and remain observable through `next`.
    pub async fn abort(&mut self) -> usize {
        self.close();
        let mut rx = self.work_rx.lock().await;
        rx.close();
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Wait for every worker to exit
    ///
    /// Completions not yet received are dropped.
    pub async fn join(mut self) -> Result<(), DispatchError> {
        self.close();
        self.done_rx.close();
        let mut first_error = None;
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                let err = if err.is_panic() {
                    DispatchError::WorkerPanicked
                } else {
                    DispatchError::WorkerAborted(err.to_string())
                };
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn run_worker(
    worker: usize,
    work_rx: Arc<Mutex<mpsc::Receiver<Document>>>,
    done_tx: mpsc::Sender<Completion>,
    index: Arc<dyn GraphIndex>,
) {
    loop {
        let Some(document) = receive_document(&work_rx).await else {
            debug!(worker, "worker terminating (queue closed)");
            break;
        };

        let result = index.insert(document.category, &document).await;
        if let Err(err) = &result {
            warn!(
                worker,
                category = %document.category,
                document_id = %document.id,
                error = %err,
                "worker insertion failed"
            );
        }

        let completion = Completion {
            id: document.id,
            category: document.category,
            worker,
            result,
        };
        if done_tx.send(completion).await.is_err() {
            debug!(worker, "completion queue dropped; worker terminating");
            break;
        }
    }
}

async fn receive_document(
    work_rx: &Arc<Mutex<mpsc::Receiver<Document>>>,
) -> Option<Document> {
    let mut guard = work_rx.lock().await;
    guard.recv().await
}
