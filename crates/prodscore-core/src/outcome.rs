use serde::Serialize;

use crate::runner::{RowOutcome, RowStatus};
use crate::summary::RunSummary;

/// How a batch ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every row was processed
    Completed,
    /// User requested stop (e.g., Ctrl+C)
    Interrupted,
    /// A fatal error stopped the batch
    Aborted { row_index: usize, error: String },
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Aborted { .. } => "aborted",
        }
    }
}

/// The final outcome of a batch run
#[derive(Debug, Serialize)]
pub struct BatchOutcome<T> {
    pub results: Vec<T>,
    pub summary: RunSummary,
    pub status: RunStatus,
}

impl<T: RowOutcome> BatchOutcome<T> {
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Aborted { .. } => 2,
            RunStatus::Interrupted => 130,
            RunStatus::Completed => {
                let all_failed = !self.results.is_empty()
                    && self.results.iter().all(|r| r.status() == RowStatus::Failed);
                if all_failed {
                    1
                } else {
                    0
                }
            }
        }
    }
}
