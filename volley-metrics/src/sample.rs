use std::time::Duration;

/// Outcome of a single request attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerResult {
    success: bool,
    latency: Duration,
    worker_id: usize,
}

impl WorkerResult {
    pub fn new(success: bool, latency: Duration, worker_id: usize) -> WorkerResult {
        WorkerResult {
            success,
            latency,
            worker_id,
        }
    }

    /// A passing attempt that took `latency`
    pub fn passed(latency: Duration, worker_id: usize) -> WorkerResult {
        WorkerResult::new(true, latency, worker_id)
    }

    /// A failing attempt that took `latency` before it failed
    pub fn failed(latency: Duration, worker_id: usize) -> WorkerResult {
        WorkerResult::new(false, latency, worker_id)
    }

    /// A failing attempt for a request that could not even be built, so no time was spent.
    pub fn unsent(worker_id: usize) -> WorkerResult {
        WorkerResult::failed(Duration::from_secs(0), worker_id)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }
}
