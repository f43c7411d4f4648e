pub mod audit;
mod error;
pub mod input;
mod outcome;
mod row;
mod runner;
mod selector;
mod summary;

pub use audit::{audit_record_from_fields, AuditRowEvaluator, AuditRowResult};
pub use error::{ErrorKind, RowError};
pub use input::{InputRow, TitleCandidates};
pub use outcome::{BatchOutcome, RunStatus};
pub use row::{LanguageSource, RowEvaluator, RowResult};
pub use runner::{BatchRunner, RowOutcome, RowPipeline, RowStatus};
pub use selector::{evaluate_candidates, pick_winner, select_best, CandidateEvaluation, CandidateOutcome, SelectionError};
pub use summary::{
    percent, AspectCounter, AspectTally, AuditTally, RunSummary, ScoreAverages, StatusCounts, SummaryDetail,
    UrlSummary,
};
