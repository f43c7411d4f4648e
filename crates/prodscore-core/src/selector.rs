use futures::future::join_all;
use prodscore_criteria::{EvaluationError, FieldVerdict};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// One scored candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateEvaluation {
    pub candidate_index: usize,
    pub candidate_text: String,
    pub verdict: FieldVerdict,
}

pub type CandidateOutcome = Result<CandidateEvaluation, (usize, EvaluationError)>;

#[derive(Error, Debug, Clone)]
pub enum SelectionError {
    #[error("No candidates to evaluate")]
    NoCandidates,

    #[error("No viable candidate: {}", summarize(.errors))]
    NoViableCandidate { errors: Vec<(usize, EvaluationError)> },
}

impl SelectionError {
    pub fn is_fatal(&self) -> bool {
        match self {
            SelectionError::NoCandidates => false,
            SelectionError::NoViableCandidate { errors } => errors.iter().any(|(_, e)| e.is_fatal()),
        }
    }
}

fn summarize(errors: &[(usize, EvaluationError)]) -> String {
    errors
        .iter()
        .map(|(i, e)| format!("candidate {}: {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Evaluate every candidate independently and concurrently.
///
/// Outcomes come back in candidate order. One failure never prevents the
/// others from being evaluated.
pub async fn evaluate_candidates<F, Fut>(candidates: &[String], evaluate: F) -> Vec<CandidateOutcome>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<FieldVerdict, EvaluationError>>,
{
    let evaluations = candidates.iter().enumerate().map(|(index, text)| {
        let pending = evaluate(text.clone());
        async move {
            match pending.await {
                Ok(verdict) => Ok(CandidateEvaluation {
                    candidate_index: index,
                    candidate_text: text.clone(),
                    verdict,
                }),
                Err(e) => Err((index, e)),
            }
        }
    });
    join_all(evaluations).await
}

/// Pick the highest `field_score`; ties go to the earliest candidate
pub fn pick_winner(outcomes: Vec<CandidateOutcome>) -> Result<CandidateEvaluation, SelectionError> {
    if outcomes.is_empty() {
        return Err(SelectionError::NoCandidates);
    }

    let mut best: Option<CandidateEvaluation> = None;
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(candidate) => {
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.verdict.field_score() > b.verdict.field_score());
                if better {
                    best = Some(candidate);
                }
            }
            Err(failure) => errors.push(failure),
        }
    }

    match best {
        Some(winner) => {
            debug!(
                winner = winner.candidate_index,
                field_score = %winner.verdict.field_score(),
                failed = errors.len(),
                "Selected candidate"
            );
            Ok(winner)
        }
        None => Err(SelectionError::NoViableCandidate { errors }),
    }
}

/// Evaluate all candidates and pick the best
pub async fn select_best<F, Fut>(candidates: &[String], evaluate: F) -> Result<CandidateEvaluation, SelectionError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<FieldVerdict, EvaluationError>>,
{
    pick_winner(evaluate_candidates(candidates, evaluate).await)
}
