use serde::{Deserialize, Serialize};

/// The stored progress state of one generation session.
///
/// Invariant: a record is never replaced by one with a smaller `order`,
/// regardless of wall-clock arrival time. That rule alone keeps the visible
/// progress monotonic when per-column generations interleave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Monotonic update counter within one generation session
    pub order: u64,
    /// Accumulated engine stderr for diagnostics
    pub stderr: String,
    /// Human-readable name of the dataset currently generating
    pub name: String,
    /// Overall progress across all datasets, in [0, 1]
    pub progress: f64,
}

/// What a polling caller receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub name: String,
    /// `None` when no record exists (not started, or expired)
    pub progress: Option<f64>,
    pub stderr: String,
}

impl ProgressReport {
    /// Report for a session with no stored record.
    pub fn empty() -> Self {
        Self { name: String::new(), progress: None, stderr: String::new() }
    }
}

impl From<ProgressRecord> for ProgressReport {
    fn from(record: ProgressRecord) -> Self {
        Self { name: record.name, progress: Some(record.progress), stderr: record.stderr }
    }
}
