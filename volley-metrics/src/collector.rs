use crate::results::ResultSet;
use crate::sample::WorkerResult;
use crossbeam::channel::{unbounded, Receiver, Sender};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector stopped before all results were delivered")]
    Disconnected,
}

/// Single consumer for the results produced by any number of workers.
///
/// Workers get a [`CollectorHandle`] each; [`Collector::drain`] blocks until
/// every handle is gone and hands back everything that was sent.
pub struct Collector {
    tx: Sender<WorkerResult>,
    rx: Receiver<WorkerResult>,
    capacity: usize,
}

impl Default for Collector {
    fn default() -> Self {
        Collector::new()
    }
}

impl Collector {
    pub fn new() -> Collector {
        Collector::with_capacity(0)
    }

    /// Create a collector expecting roughly `capacity` results.
    pub fn with_capacity(capacity: usize) -> Collector {
        let (tx, rx) = unbounded();
        Collector { tx, rx, capacity }
    }

    pub fn handle(&self) -> CollectorHandle {
        CollectorHandle {
            sender: self.tx.clone(),
        }
    }

    /// Receive results until all handles have been dropped.
    pub fn drain(self) -> ResultSet {
        let Collector { tx, rx, capacity } = self;
        drop(tx);
        let mut results = ResultSet::with_capacity(capacity);
        for result in rx.iter() {
            results.push(result);
        }
        results
    }
}

#[derive(Debug, Clone)]
pub struct CollectorHandle {
    sender: Sender<WorkerResult>,
}

impl CollectorHandle {
    pub fn send(&self, result: WorkerResult) -> Result<(), CollectorError> {
        self.sender
            .send(result)
            .map_err(|_| CollectorError::Disconnected)
    }
}
