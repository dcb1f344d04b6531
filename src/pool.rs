//! Fixed-size worker pool with one bounded queue per worker
//!
//! Requests are routed by `index mod worker_count`, so the assignment of an
//! index to a worker depends only on the index and the pool size. A full
//! queue makes [`Submitter::submit`] wait, which throttles the dispatcher to
//! the speed of the slowest worker it feeds.

use crate::error::GenError;
use crate::producer::ProducerOptions;
use crate::worker::{worker_loop, Completion, GenerationRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// Default number of pending requests per worker queue.
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// How long shutdown waits for each worker to finish its current request.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Sending side of the pool's queues.
///
/// Cloneable so the dispatcher can own a handle while the pool keeps its
/// own. Workers see their queue close once every handle is dropped.
#[derive(Clone)]
pub struct Submitter {
    queues: Vec<mpsc::Sender<GenerationRequest>>,
    token: CancellationToken,
}

impl Submitter {
    #[cfg(test)]
    pub fn from_queues(queues: Vec<mpsc::Sender<GenerationRequest>>) -> Self {
        Self {
            queues,
            token: CancellationToken::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }

    /// Queue index that `index` is routed to.
    pub fn worker_for(&self, index: u64) -> usize {
        (index % self.queues.len() as u64) as usize
    }

    /// Send `request` to worker `index mod worker_count`, waiting while that
    /// worker's queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::PoolClosed`] if the pool was cancelled or the
    /// worker's queue is closed.
    pub async fn submit(&self, index: u64, request: GenerationRequest) -> Result<(), GenError> {
        if self.token.is_cancelled() {
            return Err(GenError::PoolClosed);
        }

        let queue = &self.queues[self.worker_for(index)];
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(GenError::PoolClosed),
            sent = queue.send(request) => sent.map_err(|_| GenError::PoolClosed),
        }
    }
}

/// Worker pool for handling generation requests
pub struct WorkerPool {
    submitter: Submitter,
    workers: Vec<JoinHandle<()>>,
    token: CancellationToken,
}

impl WorkerPool {
    /// Create `worker_count` queues of `queue_size` slots and spawn one
    /// worker per queue.
    ///
    /// Completion events from every worker go to `events`.
    pub fn start(
        worker_count: usize,
        queue_size: usize,
        options: Arc<ProducerOptions>,
        events: mpsc::UnboundedSender<Completion>,
        token: CancellationToken,
    ) -> Result<Self, GenError> {
        if worker_count == 0 {
            return Err(GenError::ConfigError(
                "worker count must be greater than 0".to_string(),
            ));
        }
        if queue_size == 0 {
            return Err(GenError::ConfigError(
                "queue size must be greater than 0".to_string(),
            ));
        }

        let mut queues = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let (tx, rx) = mpsc::channel(queue_size);
            queues.push(tx);

            let span = info_span!("worker", id = worker_id);
            workers.push(tokio::spawn(
                worker_loop(
                    worker_id,
                    rx,
                    options.clone(),
                    events.clone(),
                    token.clone(),
                )
                .instrument(span),
            ));
        }

        Ok(Self {
            submitter: Submitter {
                queues,
                token: token.clone(),
            },
            workers,
            token,
        })
    }

    /// A new submission handle.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the pool and wait for the workers to exit.
    ///
    /// With `drain` the queues are closed and workers finish everything
    /// already queued. Without it the cancellation token is fired and
    /// workers stop after their current request.
    pub async fn shutdown(self, drain: bool) {
        let Self {
            submitter,
            workers,
            token,
        } = self;

        if !drain {
            token.cancel();
        }
        drop(submitter);

        for (worker_id, handle) in workers.into_iter().enumerate() {
            match timeout(WORKER_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!(worker_id, "Worker joined"),
                Ok(Err(e)) => warn!(worker_id, error = %e, "Worker task failed"),
                Err(_) => warn!(worker_id, "Worker shutdown timed out"),
            }
        }
    }
}
