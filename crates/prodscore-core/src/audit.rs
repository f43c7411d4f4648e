use async_trait::async_trait;
use prodscore_criteria::audit::{failed_review, merge_review};
use prodscore_criteria::{AuditAspect, AuditAspectResult, AuditProfile, AuditPrompts, AuditRecord, AuditStatus};
use prodscore_scorer::{ModelTier, ScoreRequest, ScorerGateway, DEFAULT_TEMPERATURE};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RowError;
use crate::input::{columns, lookup};
use crate::runner::{RowOutcome, RowPipeline, RowStatus};
use crate::summary::{AuditTally, SummaryDetail};

/// Audit result for one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRowResult {
    pub row_index: usize,
    pub id: String,
    pub url: String,
    pub title: String,
    pub aspects: Vec<AuditAspectResult>,
    /// Worst status over all aspects
    pub overall_status: AuditStatus,
    pub failure: Option<RowError>,
}

impl AuditRowResult {
    pub fn aspect(&self, aspect: AuditAspect) -> Option<&AuditAspectResult> {
        self.aspects.iter().find(|a| a.aspect == aspect)
    }
}

/// Build an audit record from named fields; the row number stands in for a missing id
pub fn audit_record_from_fields(row_index: usize, fields: &HashMap<String, String>) -> AuditRecord {
    let get = |names: &[&str]| lookup(fields, names).unwrap_or_default().to_string();
    AuditRecord::from_raw(
        lookup(fields, columns::AUDIT_ID)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| (row_index + 1).to_string()),
        get(columns::AUDIT_URL),
        get(columns::AUDIT_TITLE),
        get(columns::AUDIT_DESCRIPTION),
        lookup(fields, columns::AUDIT_CATEGORY).unwrap_or_default(),
        lookup(fields, columns::AUDIT_KEYWORDS).unwrap_or_default(),
    )
}

/// Reviews one product per gateway call and applies the local rules
pub struct AuditRowEvaluator {
    gateway: Arc<ScorerGateway>,
    model: ModelTier,
    profile: AuditProfile,
    temperature: f32,
}

impl AuditRowEvaluator {
    pub fn new(gateway: Arc<ScorerGateway>, model: ModelTier, profile: AuditProfile) -> Self {
        Self {
            gateway,
            model,
            profile,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn profile(&self) -> AuditProfile {
        self.profile
    }

    pub fn build_request(&self, record: &AuditRecord) -> ScoreRequest {
        ScoreRequest::new(AuditPrompts::build_audit_prompt(self.profile, record), self.model)
            .with_system(AuditPrompts::system_message(self.profile))
            .with_temperature(self.temperature)
    }

    /// Audit one record. Never fails: a scorer error marks every aspect for
    /// manual check and is recorded in `failure`.
    pub async fn audit_row(&self, row_index: usize, record: AuditRecord) -> AuditRowResult {
        let request = self.build_request(&record);
        debug!(row_index, id = %record.id, profile = self.profile.as_str(), "Auditing product");

        let (aspects, failure) = match self.gateway.evaluate(&request).await {
            Ok(verdict) => (merge_review(self.profile, &record, &verdict), None),
            Err(e) => {
                warn!(row_index, error = %e, "Audit review failed");
                let reason = format!("review failed: {}", e);
                (failed_review(self.profile, &reason), Some(RowError::from(&e)))
            }
        };

        AuditRowResult {
            row_index,
            overall_status: AuditStatus::worst(aspects.iter().map(|a| a.status)),
            id: record.id,
            url: record.url,
            title: record.title,
            aspects,
            failure,
        }
    }
}

#[async_trait]
impl RowPipeline for AuditRowEvaluator {
    type Input = AuditRecord;
    type Output = AuditRowResult;

    fn input_id(&self, _row_index: usize, input: &AuditRecord) -> String {
        input.id.clone()
    }

    async fn process(&self, row_index: usize, input: AuditRecord) -> AuditRowResult {
        self.audit_row(row_index, input).await
    }
}

impl RowOutcome for AuditRowResult {
    fn row_index(&self) -> usize {
        self.row_index
    }

    fn row_id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> RowStatus {
        match self.failure {
            Some(_) => RowStatus::Failed,
            None => RowStatus::Full,
        }
    }

    fn failure(&self) -> Option<&RowError> {
        self.failure.as_ref()
    }

    fn outcome_label(&self) -> String {
        self.overall_status.to_string()
    }

    fn detail(results: &[Self]) -> Option<SummaryDetail> {
        Some(SummaryDetail::Audit(AuditTally::from_results(results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_record_from_either_column_scheme() {
        let record = audit_record_from_fields(
            0,
            &fields(&[
                ("offer_id", "A-17"),
                ("url", " https://shop.example/p/17 "),
                ("title", "Desk Lamp"),
                ("description", "LED lamp"),
                ("category_name", r#"{"catPath": "Home > Lighting"}"#),
                ("keywords", r#"["lamp", "led"]"#),
            ]),
        );
        assert_eq!(record.id, "A-17");
        assert_eq!(record.url, "https://shop.example/p/17");
        assert_eq!(record.category, "Home > Lighting");
        assert_eq!(record.keywords, "lamp, led");
    }

    #[test]
    fn test_record_without_id_uses_row_number() {
        let record = audit_record_from_fields(2, &fields(&[("title", "Lamp")]));
        assert_eq!(record.id, "3");
        assert!(record.category.is_empty());
    }
}
