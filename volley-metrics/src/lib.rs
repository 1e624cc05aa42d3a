mod collector;
mod results;
mod sample;
mod snapshots;
mod stopwatch;
mod util;

pub use self::collector::{Collector, CollectorError, CollectorHandle};
pub use self::results::ResultSet;
pub use self::sample::WorkerResult;
pub use self::stopwatch::Stopwatch;
pub mod stats {
    pub use crate::snapshots::{default_percentiles, Percentile, Statistics, StatsError};
}
