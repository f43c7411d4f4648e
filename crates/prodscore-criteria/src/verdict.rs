use serde::{Deserialize, Serialize};

use crate::{CriterionGroup, FieldKind};

/// A criterion score: 0 = not met, 1 = partially met, 2 = fully met
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const ZERO: Score = Score(0);
    pub const ONE: Score = Score(1);
    pub const MAX: Score = Score(2);

    pub fn new(value: u8) -> Option<Self> {
        (value <= 2).then_some(Score(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(value).ok_or_else(|| format!("score {} is outside 0..=2", value))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Score and reason for one criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion_id: String,
    pub score: Score,
    /// Always in English; non-empty whenever the score is below 2
    pub reason: String,
}

/// The evaluation of one content field.
///
/// `field_score` is derived: the minimum over both groups, where an empty
/// group counts as fully met. Construct through [`FieldVerdict::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldVerdict {
    field_kind: FieldKind,
    must_have: Vec<CriterionResult>,
    must_avoid: Vec<CriterionResult>,
    must_have_score: Score,
    must_avoid_score: Score,
    field_score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

impl FieldVerdict {
    pub fn new(
        field_kind: FieldKind,
        must_have: Vec<CriterionResult>,
        must_avoid: Vec<CriterionResult>,
        summary: Option<String>,
    ) -> Self {
        let must_have_score = group_min(&must_have);
        let must_avoid_score = group_min(&must_avoid);
        Self {
            field_kind,
            must_have,
            must_avoid,
            must_have_score,
            must_avoid_score,
            field_score: must_have_score.min(must_avoid_score),
            summary,
        }
    }

    pub fn field_kind(&self) -> FieldKind {
        self.field_kind
    }

    pub fn must_have(&self) -> &[CriterionResult] {
        &self.must_have
    }

    pub fn must_avoid(&self) -> &[CriterionResult] {
        &self.must_avoid
    }

    pub fn group(&self, group: CriterionGroup) -> &[CriterionResult] {
        match group {
            CriterionGroup::MustHave => &self.must_have,
            CriterionGroup::MustAvoid => &self.must_avoid,
        }
    }

    pub fn must_have_score(&self) -> Score {
        self.must_have_score
    }

    pub fn must_avoid_score(&self) -> Score {
        self.must_avoid_score
    }

    pub fn field_score(&self) -> Score {
        self.field_score
    }

    /// Model-written overall reason, if any
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn criterion(&self, id: &str) -> Option<&CriterionResult> {
        self.must_have
            .iter()
            .chain(self.must_avoid.iter())
            .find(|c| c.criterion_id == id)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn group_min(results: &[CriterionResult]) -> Score {
    results.iter().map(|r| r.score).min().unwrap_or(Score::MAX)
}
