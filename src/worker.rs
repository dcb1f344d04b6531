//! Worker loop for CPU-bound QR image production
//!
//! Each worker owns the receiving side of one bounded queue. It is Idle while
//! waiting on that queue and Processing while one request runs on the
//! blocking thread pool. Every request ends in exactly one [`Completion`]
//! event sent to the monitor.

use crate::error::GenError;
use crate::producer::{produce, ProducerOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A single image to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Zero-based position in the requested range
    pub index: u64,
    pub text: String,
    pub output_path: PathBuf,
}

/// Outcome of one request, reported by the worker that ran it.
#[derive(Debug)]
pub enum Completion {
    Done {
        index: u64,
        path: PathBuf,
    },
    Failed {
        index: u64,
        path: PathBuf,
        error: GenError,
    },
}

/// Run until the queue is closed and drained or `token` is cancelled.
///
/// A request already being processed when cancellation arrives is finished
/// and reported.
pub async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<GenerationRequest>,
    options: Arc<ProducerOptions>,
    events: mpsc::UnboundedSender<Completion>,
    token: CancellationToken,
) {
    debug!(worker_id, "Worker started");

    loop {
        let request = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(worker_id, "Worker received shutdown signal");
                break;
            }
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let GenerationRequest {
            index,
            text,
            output_path,
        } = request;

        let opts = options.clone();
        let path = output_path.clone();
        let result = tokio::task::spawn_blocking(move || produce(&text, &path, &opts))
            .await
            .unwrap_or_else(|e| Err(GenError::Internal(e.to_string())));

        let event = match result {
            Ok(()) => {
                info!(worker_id, index, path = %output_path.display(), "qrcode generated");
                Completion::Done {
                    index,
                    path: output_path,
                }
            }
            Err(error) => {
                error!(worker_id, index, path = %output_path.display(), error = %error, "qrcode generation failed");
                Completion::Failed {
                    index,
                    path: output_path,
                    error,
                }
            }
        };

        // Monitor gone means the run is over
        if events.send(event).is_err() {
            break;
        }
    }

    debug!(worker_id, "Worker stopped");
}
