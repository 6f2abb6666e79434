//! Fixed pool of OS threads running the blocking analysis operations.
//!
//! Handlers send a request plus a oneshot reply channel; whichever worker
//! is free picks it up. A panic inside an operation is caught and reported
//! to that request only, and the worker keeps serving.

use sightline_core::{AiService, ComparisonResult, DetectedRegion, FaceSignature, ServiceError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("{0}")]
    Service(#[from] ServiceError),
    #[error("operation panicked: {0}")]
    Panicked(String),
    #[error("worker pool exited")]
    ChannelClosed,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from HTTP handlers to the worker threads.
enum WorkerRequest {
    Encode {
        payload: String,
        reply: oneshot::Sender<Result<Option<FaceSignature>, WorkerError>>,
    },
    Compare {
        known: FaceSignature,
        unknown: FaceSignature,
        tolerance: f64,
        reply: oneshot::Sender<Result<ComparisonResult, WorkerError>>,
    },
    Detect {
        payload: String,
        reply: oneshot::Sender<Vec<DetectedRegion>>,
    },
}

/// Clone-safe handle to the worker pool.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    /// Signature of the first face in a base64 image, `None` if there is none.
    pub async fn encode(&self, payload: String) -> Result<Option<FaceSignature>, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WorkerRequest::Encode { payload, reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    /// Compare two signatures.
    pub async fn compare(
        &self,
        known: FaceSignature,
        unknown: FaceSignature,
        tolerance: f64,
    ) -> Result<ComparisonResult, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WorkerRequest::Compare {
            known,
            unknown,
            tolerance,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    /// Foreground regions of a base64 image.
    pub async fn detect(&self, payload: String) -> Result<Vec<DetectedRegion>, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WorkerRequest::Detect { payload, reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    async fn send(&self, request: WorkerRequest) -> Result<(), WorkerError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

/// Spawn `workers` threads sharing `service`, fed by a queue of `queue_depth`.
pub fn spawn_workers(
    service: Arc<AiService>,
    workers: usize,
    queue_depth: usize,
) -> Result<WorkerHandle, WorkerError> {
    let (tx, rx) = mpsc::channel::<WorkerRequest>(queue_depth.max(1));
    let rx = Arc::new(Mutex::new(rx));

    for id in 0..workers.max(1) {
        let service = Arc::clone(&service);
        let rx = Arc::clone(&rx);

        std::thread::Builder::new()
            .name(format!("sightline-worker-{id}"))
            .spawn(move || {
                tracing::debug!(worker = id, "worker thread started");
                while let Some(request) = next_request(&rx) {
                    handle(&service, request);
                }
                tracing::debug!(worker = id, "worker thread exiting");
            })?;
    }

    tracing::info!(workers, queue_depth, "worker pool started");
    Ok(WorkerHandle { tx })
}

/// Wait for the next request. The lock is held only by the idle worker
/// currently waiting on the channel.
fn next_request(rx: &Mutex<mpsc::Receiver<WorkerRequest>>) -> Option<WorkerRequest> {
    let mut guard = match rx.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.blocking_recv()
}

fn handle(service: &AiService, request: WorkerRequest) {
    match request {
        WorkerRequest::Encode { payload, reply } => {
            let result = guarded("encode", || service.encode_image_from_base64(&payload))
                .and_then(|r| r.map_err(WorkerError::from));
            let _ = reply.send(result);
        }
        WorkerRequest::Compare {
            known,
            unknown,
            tolerance,
            reply,
        } => {
            let result = guarded("compare", || service.compare_faces(&known, &unknown, tolerance))
                .and_then(|r| r.map_err(WorkerError::from));
            let _ = reply.send(result);
        }
        WorkerRequest::Detect { payload, reply } => {
            let regions = guarded("detect", || service.detect_objects(&payload)).unwrap_or_default();
            let _ = reply.send(regions);
        }
    }
}

/// Run `op`, turning a panic into an error for this request only.
fn guarded<T>(op: &str, f: impl FnOnce() -> T) -> Result<T, WorkerError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(op, panic = %message, "operation panicked");
        WorkerError::Panicked(message)
    })
}
