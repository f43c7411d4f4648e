use prodscore_criteria::{EvaluationError, FieldKind, VerdictParseError};
use prodscore_scorer::ScoringError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::SelectionError;

/// Classification of a row-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Transport,
    MalformedResponse,
    MissingCriterion,
    NoViableCandidate,
    IncompleteRow,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Transport => "transport",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::MissingCriterion => "missing_criterion",
            ErrorKind::NoViableCandidate => "no_viable_candidate",
            ErrorKind::IncompleteRow => "incomplete_row",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first error recorded for a row
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RowError {
    pub kind: ErrorKind,
    pub message: String,
    /// Field being evaluated when the error occurred, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldKind>,
}

impl RowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
        }
    }

    pub fn incomplete(missing: &[&str]) -> Self {
        Self::new(
            ErrorKind::IncompleteRow,
            format!("missing {}", missing.join(", ")),
        )
    }

    pub fn in_field(mut self, field: FieldKind) -> Self {
        self.field = Some(field);
        self
    }

    /// Auth failures stop the whole batch
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Auth
    }
}

impl From<&ScoringError> for RowError {
    fn from(err: &ScoringError) -> Self {
        let kind = match err {
            ScoringError::Auth(_) => ErrorKind::Auth,
            ScoringError::Transport { .. } | ScoringError::InvalidRequest(_) => ErrorKind::Transport,
            ScoringError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        };
        RowError::new(kind, err.to_string())
    }
}

impl From<&EvaluationError> for RowError {
    fn from(err: &EvaluationError) -> Self {
        match err {
            EvaluationError::Scoring(e) => RowError::from(e),
            EvaluationError::Parse(VerdictParseError::MissingCriterion { .. }) => {
                RowError::new(ErrorKind::MissingCriterion, err.to_string())
            }
            EvaluationError::Parse(_) => RowError::new(ErrorKind::MalformedResponse, err.to_string()),
        }
    }
}

impl From<&SelectionError> for RowError {
    fn from(err: &SelectionError) -> Self {
        // A fatal candidate failure must still abort the batch
        let kind = if err.is_fatal() {
            ErrorKind::Auth
        } else {
            ErrorKind::NoViableCandidate
        };
        RowError::new(kind, err.to_string())
    }
}
