use crate::sample::WorkerResult;
use std::collections::BTreeMap;
use std::iter::FromIterator;

/// Every outcome recorded during a run, in arrival order.
///
/// Arrival order carries no meaning; nothing computed from a `ResultSet`
/// depends on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<WorkerResult>,
}

impl ResultSet {
    pub fn new() -> ResultSet {
        ResultSet::default()
    }

    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, result: WorkerResult) {
        self.records.push(result);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerResult> {
        self.records.iter()
    }

    /// Group the records by the worker that produced them.
    pub fn by_worker(&self) -> BTreeMap<usize, Vec<&WorkerResult>> {
        let mut grouped: BTreeMap<usize, Vec<&WorkerResult>> = BTreeMap::new();
        for r in &self.records {
            grouped.entry(r.worker_id()).or_default().push(r);
        }
        grouped
    }
}

impl From<Vec<WorkerResult>> for ResultSet {
    fn from(records: Vec<WorkerResult>) -> ResultSet {
        ResultSet { records }
    }
}

impl FromIterator<WorkerResult> for ResultSet {
    fn from_iter<I: IntoIterator<Item = WorkerResult>>(iter: I) -> ResultSet {
        ResultSet {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = WorkerResult;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
