use crate::worker::WorkerHandle;

/// Shared handler state. Cheap to clone: the pool handle is a channel sender.
#[derive(Clone)]
pub struct AppState {
    pub workers: WorkerHandle,
    /// Tolerance applied when a compare request omits one.
    pub default_tolerance: f64,
}
