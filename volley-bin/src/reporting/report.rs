use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;
use volley_metrics::stats::{Percentile, Statistics};

const COLUMN_WIDTH: usize = 15;

/// Fixed-width table of a run's statistics.
pub struct Report<'a> {
    stats: &'a Statistics,
    percentiles: &'a [Percentile],
}

impl<'a> Report<'a> {
    /// `percentiles` picks the columns of the percentile table; ranks the
    /// statistics have no value for are shown as `-`.
    pub fn new(stats: &'a Statistics, percentiles: &'a [Percentile]) -> Report<'a> {
        Report { stats, percentiles }
    }
}

fn fmt_duration(d: &Duration) -> String {
    if *d == Duration::from_secs(0) {
        "0s".into()
    } else if d.as_secs() >= 5 {
        format!("{:.3}s", d.as_secs_f64())
    } else if d.as_millis() >= 1 {
        format!("{:.2}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{}µs", d.as_micros())
    }
}

fn write_row<I>(f: &mut Formatter, cells: I) -> FmtResult
where
    I: IntoIterator,
    I::Item: Display,
{
    let row: Vec<String> = cells
        .into_iter()
        .map(|c| format!("{:>width$}", c.to_string(), width = COLUMN_WIDTH))
        .collect();
    writeln!(f, "{}", row.join(" "))
}

impl<'a> Display for Report<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let s = self.stats;
        writeln!(f, "Requests:")?;
        write_row(f, &["Total", "Passed", "Failed", "Mean"])?;
        write_row(
            f,
            &[
                s.total().to_string(),
                s.passed().to_string(),
                s.failed().to_string(),
                fmt_duration(&s.mean()),
            ],
        )?;
        writeln!(f, "Percentiles:")?;
        write_row(f, self.percentiles)?;
        write_row(
            f,
            self.percentiles.iter().map(|p| {
                s.percentile(*p)
                    .map(|d| fmt_duration(&d))
                    .unwrap_or_else(|| "-".into())
            }),
        )
    }
}
