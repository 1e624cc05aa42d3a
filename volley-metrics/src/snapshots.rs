use crate::results::ResultSet;
use crate::util;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("percentile rank {0} is outside 0..=100")]
    InvalidPercentile(u8),
}

/// A requested percentile rank, 0 through 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentile(u8);

impl Percentile {
    pub fn new(rank: u8) -> Result<Percentile, StatsError> {
        if rank > 100 {
            return Err(StatsError::InvalidPercentile(rank));
        }
        Ok(Percentile(rank))
    }

    pub fn rank(&self) -> u8 {
        self.0
    }

    /// 1-indexed nearest-rank position among `n` sorted values.
    fn nearest_rank(&self, n: usize) -> usize {
        let k = (usize::from(self.0) * n + 99) / 100;
        k.max(1)
    }
}

impl Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

pub fn default_percentiles() -> Vec<Percentile> {
    vec![
        Percentile(0),
        Percentile(25),
        Percentile(50),
        Percentile(75),
        Percentile(100),
    ]
}

/// Aggregate view of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    total: usize,
    passed: usize,
    failed: usize,
    mean: Duration,
    percentiles: BTreeMap<Percentile, Duration>,
}

impl Statistics {
    /// Reduce `results` using the default percentile ranks.
    pub fn compute(results: ResultSet) -> Statistics {
        Statistics::compute_with(results, &default_percentiles())
    }

    /// Reduce `results`, reporting latency at each of `percentiles`.
    ///
    /// Only passing requests contribute to the mean and the percentiles.
    /// With no passing requests the mean is zero and no percentile is reported.
    pub fn compute_with(results: ResultSet, percentiles: &[Percentile]) -> Statistics {
        let total = results.len();
        let mut latencies: Vec<Duration> = results
            .into_iter()
            .filter(|r| r.success())
            .map(|r| r.latency())
            .collect();
        let passed = latencies.len();
        if passed == 0 {
            return Statistics {
                total,
                passed,
                failed: total,
                mean: Duration::from_secs(0),
                percentiles: BTreeMap::new(),
            };
        }

        let sum: u128 = latencies.iter().map(Duration::as_nanos).sum();
        let mean = util::nanos_to_dur(sum / passed as u128);

        latencies.sort_unstable();
        let percentiles = percentiles
            .iter()
            .map(|p| (*p, latencies[p.nearest_rank(passed) - 1]))
            .collect();

        Statistics {
            total,
            passed,
            failed: total - passed,
            mean,
            percentiles,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn mean(&self) -> Duration {
        self.mean
    }

    pub fn percentile(&self, p: Percentile) -> Option<Duration> {
        self.percentiles.get(&p).copied()
    }

    /// Computed percentiles in ascending rank order. Empty if nothing passed.
    pub fn percentiles(&self) -> impl Iterator<Item = (Percentile, Duration)> + '_ {
        self.percentiles.iter().map(|(p, d)| (*p, *d))
    }
}
