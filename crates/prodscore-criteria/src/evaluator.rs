use prodscore_scorer::{ModelTier, ScoreRequest, ScorerGateway, ScoringError, DEFAULT_TEMPERATURE};
use std::sync::Arc;
use tracing::{debug, info};

use crate::prompts::{EvaluationPrompts, PromptLanguage};
use crate::{parse_field_verdict, FieldKind, FieldVerdict, VerdictParseError};

/// Texts needed to evaluate one field.
///
/// For a title, `optimized_description` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldContent<'a> {
    pub kind: FieldKind,
    pub original_title: &'a str,
    pub original_description: &'a str,
    pub optimized_title: &'a str,
    pub optimized_description: &'a str,
}

impl<'a> FieldContent<'a> {
    pub fn title(original_title: &'a str, original_description: &'a str, optimized_title: &'a str) -> Self {
        Self {
            kind: FieldKind::Title,
            original_title,
            original_description,
            optimized_title,
            optimized_description: "",
        }
    }

    pub fn description(
        original_title: &'a str,
        original_description: &'a str,
        optimized_title: &'a str,
        optimized_description: &'a str,
    ) -> Self {
        Self {
            kind: FieldKind::Description,
            original_title,
            original_description,
            optimized_title,
            optimized_description,
        }
    }

    /// The optimized text under evaluation
    pub fn candidate_text(&self) -> &'a str {
        match self.kind {
            FieldKind::Title => self.optimized_title,
            FieldKind::Description => self.optimized_description,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Failed to parse verdict: {0}")]
    Parse(#[from] VerdictParseError),
}

impl EvaluationError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvaluationError::Scoring(e) if e.is_fatal())
    }
}

/// Evaluates one field with one gateway call
#[derive(Clone)]
pub struct CriterionEvaluator {
    gateway: Arc<ScorerGateway>,
    model: ModelTier,
    temperature: f32,
}

impl CriterionEvaluator {
    pub fn new(gateway: Arc<ScorerGateway>, model: ModelTier) -> Self {
        Self {
            gateway,
            model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_request(&self, content: &FieldContent<'_>, language: &str) -> ScoreRequest {
        let prompt = EvaluationPrompts::build_field_prompt(content, language);
        let system = EvaluationPrompts::system_message(PromptLanguage::for_tag(language));
        ScoreRequest::new(prompt, self.model)
            .with_system(system)
            .with_temperature(self.temperature)
    }

    pub async fn evaluate_field(
        &self,
        content: &FieldContent<'_>,
        language: &str,
    ) -> Result<FieldVerdict, EvaluationError> {
        let request = self.build_request(content, language);

        debug!(
            field = %content.kind,
            language,
            prompt_len = request.prompt.len(),
            "Running criterion evaluation"
        );

        let verdict = self.gateway.evaluate(&request).await?;
        let parsed = parse_field_verdict(content.kind, &verdict)?;

        info!(
            field = %content.kind,
            field_score = %parsed.field_score(),
            "Field evaluated"
        );
        Ok(parsed)
    }
}
