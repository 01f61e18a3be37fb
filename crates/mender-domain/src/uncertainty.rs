//! Uncertainty log - the gaps found during one answer session

use serde::{Deserialize, Serialize};

/// A single detected gap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncertaintyRecord {
    /// Why the draft was not fully grounded
    pub reason: String,

    /// Position in the session's log
    pub index: usize,
}

/// Session-scoped, append-only list of uncertainties.
///
/// Never persisted. The repair loop starts a new log for every `answer`
/// call.
#[derive(Debug, Clone, Default)]
pub struct UncertaintyLog {
    records: Vec<UncertaintyRecord>,
}

impl UncertaintyLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return it
    pub fn record(&mut self, reason: impl Into<String>) -> &UncertaintyRecord {
        let index = self.records.len();
        self.records.push(UncertaintyRecord {
            reason: reason.into(),
            index,
        });
        &self.records[index]
    }

    /// All records in insertion order
    pub fn records(&self) -> &[UncertaintyRecord] {
        &self.records
    }

    /// Consume the log, keeping the records
    pub fn into_records(self) -> Vec<UncertaintyRecord> {
        self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been logged
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
