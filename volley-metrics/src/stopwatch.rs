use crate::sample::WorkerResult;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Stopwatch::new()
    }
}

impl Stopwatch {
    /// Create a new Stopwatch, and start it.
    pub fn new() -> Stopwatch {
        Stopwatch {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the watch and record the attempt made by `worker_id`
    pub fn finish(self, worker_id: usize, success: bool) -> WorkerResult {
        WorkerResult::new(success, self.elapsed(), worker_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn finish_records_elapsed_time() {
        let stopwatch = Stopwatch::new();
        thread::sleep(Duration::from_millis(5));
        let result = stopwatch.finish(3, true);
        assert!(result.success());
        assert_eq!(result.worker_id(), 3);
        assert!(result.latency() >= Duration::from_millis(5));
    }
}
