use async_trait::async_trait;
use prodscore_criteria::{
    CriterionEvaluator, FieldContent, FieldKind, FieldVerdict, LanguageDetector, Score,
};
use prodscore_logging::{LogEvent, Logger};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RowError;
use crate::runner::{RowOutcome, RowPipeline, RowStatus};
use crate::selector::{evaluate_candidates, pick_winner};
use crate::summary::{ScoreAverages, SummaryDetail};
use crate::InputRow;

/// Where a row's language tag came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageSource {
    Column,
    Detected,
    /// Not resolved because the row was never evaluated
    Unresolved,
}

/// Evaluation result for one input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub row_index: usize,
    pub row_id: String,
    pub language: String,
    pub language_source: LanguageSource,
    pub title_verdict: Option<FieldVerdict>,
    pub description_verdict: Option<FieldVerdict>,
    /// Minimum of both field scores, present only when both fields were scored
    pub overall_score: Option<Score>,
    pub chosen_title: Option<String>,
    pub candidates_count: usize,
    pub failure: Option<RowError>,
}

impl RowResult {
    fn new(row_index: usize, row: &InputRow) -> Self {
        Self {
            row_index,
            row_id: row.row_id.clone(),
            language: String::new(),
            language_source: LanguageSource::Unresolved,
            title_verdict: None,
            description_verdict: None,
            overall_score: None,
            chosen_title: None,
            candidates_count: row.candidates().len(),
            failure: None,
        }
    }

    fn record_failure(&mut self, error: RowError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    pub fn title_score(&self) -> Option<Score> {
        self.title_verdict.as_ref().map(FieldVerdict::field_score)
    }

    pub fn description_score(&self) -> Option<Score> {
        self.description_verdict.as_ref().map(FieldVerdict::field_score)
    }
}

/// Evaluates one row: language, title selection, description, overall score
pub struct RowEvaluator {
    evaluator: CriterionEvaluator,
    detector: Arc<dyn LanguageDetector>,
    logger: Option<Arc<Logger>>,
}

impl RowEvaluator {
    pub fn new(evaluator: CriterionEvaluator, detector: Arc<dyn LanguageDetector>) -> Self {
        Self {
            evaluator,
            detector,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Explicit tag if present, otherwise one detection over the original
    /// title. The description is only consulted when the title is blank.
    pub fn resolve_language(&self, row: &InputRow) -> (String, LanguageSource) {
        match &row.lang {
            Some(tag) => (tag.clone(), LanguageSource::Column),
            None => {
                let text = if row.original_title.trim().is_empty() {
                    &row.original_description
                } else {
                    &row.original_title
                };
                (self.detector.detect(text), LanguageSource::Detected)
            }
        }
    }

    /// Evaluate one row. Never fails: errors land in `failure` and any
    /// field verdicts that completed are kept.
    pub async fn evaluate_row(&self, row_index: usize, row: &InputRow) -> RowResult {
        let mut result = RowResult::new(row_index, row);

        let missing = row.missing_fields();
        if !missing.is_empty() {
            debug!(row_index, ?missing, "Skipping incomplete row");
            result.record_failure(RowError::incomplete(&missing));
            return result;
        }

        let (language, source) = self.resolve_language(row);
        result.language = language.clone();
        result.language_source = source;
        let language = language.as_str();

        let candidates = row.candidates();
        let outcomes = evaluate_candidates(candidates, |candidate| {
            let evaluator = &self.evaluator;
            async move {
                let content = FieldContent::title(&row.original_title, &row.original_description, &candidate);
                evaluator.evaluate_field(&content, language).await
            }
        })
        .await;

        if let Some(logger) = &self.logger {
            for outcome in &outcomes {
                let (candidate_index, field_score) = match outcome {
                    Ok(c) => (c.candidate_index, Some(c.verdict.field_score().value())),
                    Err((i, _)) => (*i, None),
                };
                logger.log(&LogEvent::CandidateScored {
                    row_index,
                    candidate_index,
                    field_score,
                });
            }
        }

        // Single candidates report their own error, not a selection error
        let single_error = match (candidates.len(), outcomes.first()) {
            (1, Some(Err((_, e)))) => Some(RowError::from(e)),
            _ => None,
        };

        let description_title = match pick_winner(outcomes) {
            Ok(winner) => {
                result.title_verdict = Some(winner.verdict);
                result.chosen_title = Some(winner.candidate_text.clone());
                winner.candidate_text
            }
            Err(e) => {
                warn!(row_index, error = %e, "Title evaluation failed");
                let error = single_error.unwrap_or_else(|| RowError::from(&e));
                result.record_failure(error.in_field(FieldKind::Title));
                candidates.first().cloned().unwrap_or_default()
            }
        };

        // Stop here if the credential was rejected
        if result.failure.as_ref().is_some_and(RowError::is_fatal) {
            return result;
        }

        let content = FieldContent::description(
            &row.original_title,
            &row.original_description,
            &description_title,
            &row.optimized_description,
        );
        match self.evaluator.evaluate_field(&content, language).await {
            Ok(verdict) => result.description_verdict = Some(verdict),
            Err(e) => {
                warn!(row_index, error = %e, "Description evaluation failed");
                result.record_failure(RowError::from(&e).in_field(FieldKind::Description));
            }
        }

        result.overall_score = match (result.title_score(), result.description_score()) {
            (Some(t), Some(d)) => Some(t.min(d)),
            _ => None,
        };
        result
    }
}

#[async_trait]
impl RowPipeline for RowEvaluator {
    type Input = InputRow;
    type Output = RowResult;

    fn input_id(&self, _row_index: usize, input: &InputRow) -> String {
        input.row_id.clone()
    }

    async fn process(&self, row_index: usize, input: InputRow) -> RowResult {
        self.evaluate_row(row_index, &input).await
    }
}

impl RowOutcome for RowResult {
    fn row_index(&self) -> usize {
        self.row_index
    }

    fn row_id(&self) -> &str {
        &self.row_id
    }

    fn status(&self) -> RowStatus {
        match (&self.failure, &self.title_verdict, &self.description_verdict) {
            (None, _, _) => RowStatus::Full,
            (Some(_), None, None) => RowStatus::Failed,
            (Some(_), _, _) => RowStatus::Partial,
        }
    }

    fn failure(&self) -> Option<&RowError> {
        self.failure.as_ref()
    }

    fn outcome_label(&self) -> String {
        match self.overall_score {
            Some(score) => format!("score {}", score),
            None => "no overall score".to_string(),
        }
    }

    fn detail(results: &[Self]) -> Option<SummaryDetail> {
        Some(SummaryDetail::Scores(ScoreAverages::from_results(results)))
    }
}
