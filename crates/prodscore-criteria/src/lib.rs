pub mod audit;
mod catalogue;
pub mod evaluator;
mod language;
mod parse;
mod prompts;
mod verdict;

pub use audit::{AuditAspect, AuditAspectResult, AuditProfile, AuditRecord, AuditStatus};
pub use catalogue::{Criterion, CriterionGroup, FieldKind, DESCRIPTION_CRITERIA, TITLE_CRITERIA};
pub use evaluator::{CriterionEvaluator, EvaluationError, FieldContent};
pub use language::{HeuristicDetector, LanguageDetector};
pub use parse::{parse_field_verdict, parse_score, VerdictParseError};
pub use prompts::{length_category, AuditPrompts, EvaluationPrompts, PromptLanguage};
pub use verdict::{CriterionResult, FieldVerdict, Score};
