use prodscore_scorer::StructuredVerdict;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{CriterionGroup, CriterionResult, FieldKind, FieldVerdict, Score};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerdictParseError {
    #[error("Criterion {criterion_id} missing from {field} verdict")]
    MissingCriterion {
        field: FieldKind,
        criterion_id: String,
    },

    #[error("Criterion {criterion_id} has invalid score {value}")]
    InvalidScore { criterion_id: String, value: String },

    #[error("Criterion {criterion_id} scored {score} without a reason")]
    MissingReason { criterion_id: String, score: u8 },

    #[error("Criterion {criterion_id} is not an object: {value}")]
    InvalidFormat { criterion_id: String, value: String },
}

impl VerdictParseError {
    pub fn is_missing_criterion(&self) -> bool {
        matches!(self, VerdictParseError::MissingCriterion { .. })
    }
}

/// Parse a model verdict into exactly the criterion set of `kind`.
///
/// Each criterion is looked up inside its group object first and at the top
/// level second. Aggregate fields the model may add (`must_have_score`,
/// `overall_score`, ...) are ignored; scores are recomputed from criteria.
pub fn parse_field_verdict(
    kind: FieldKind,
    verdict: &StructuredVerdict,
) -> Result<FieldVerdict, VerdictParseError> {
    let mut must_have = Vec::new();
    let mut must_avoid = Vec::new();

    for criterion in kind.criteria() {
        let group_key = criterion.group.key();
        let raw = verdict
            .get_in(group_key, criterion.id)
            .or_else(|| verdict.get(criterion.id))
            .ok_or_else(|| VerdictParseError::MissingCriterion {
                field: kind,
                criterion_id: criterion.id.to_string(),
            })?;

        let result = parse_criterion(criterion.id, raw)?;
        match criterion.group {
            CriterionGroup::MustHave => must_have.push(result),
            CriterionGroup::MustAvoid => must_avoid.push(result),
        }
    }

    let summary = verdict
        .get("overall_reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let parsed = FieldVerdict::new(kind, must_have, must_avoid, summary);
    debug!(field = %kind, field_score = %parsed.field_score(), "Parsed field verdict");
    Ok(parsed)
}

fn parse_criterion(id: &str, raw: &Value) -> Result<CriterionResult, VerdictParseError> {
    let obj = raw.as_object().ok_or_else(|| VerdictParseError::InvalidFormat {
        criterion_id: id.to_string(),
        value: raw.to_string(),
    })?;

    let score_value = obj.get("score").unwrap_or(&Value::Null);
    let score = parse_score(score_value).ok_or_else(|| VerdictParseError::InvalidScore {
        criterion_id: id.to_string(),
        value: score_value.to_string(),
    })?;

    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(|r| r.trim().to_string())
        .unwrap_or_default();
    if reason.is_empty() && score < Score::MAX {
        return Err(VerdictParseError::MissingReason {
            criterion_id: id.to_string(),
            score: score.value(),
        });
    }

    Ok(CriterionResult {
        criterion_id: id.to_string(),
        score,
        reason,
    })
}

/// Accept 0/1/2 as integer, integral float or numeric string
pub fn parse_score(value: &Value) -> Option<Score> {
    let n = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        })?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })?
        }
        _ => return None,
    };
    u8::try_from(n).ok().and_then(Score::new)
}
