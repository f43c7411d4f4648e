use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{ScoreRequest, Scorer, ScoringError, StructuredVerdict};

type Responder = dyn Fn(&ScoreRequest) -> Result<StructuredVerdict, ScoringError> + Send + Sync;

/// In-process scorer for tests and dry runs.
///
/// Every request is recorded so callers can inspect the prompts that were sent.
pub struct MockScorer {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ScoreRequest>>,
}

impl MockScorer {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ScoreRequest) -> Result<StructuredVerdict, ScoringError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replay the given responses in order, then fail every further call
    pub fn sequence(responses: Vec<Result<StructuredVerdict, ScoringError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(ScoringError::rejected("mock responses exhausted")))
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<ScoreRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Scorer for MockScorer {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn evaluate(&self, request: &ScoreRequest) -> Result<StructuredVerdict, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        (self.responder)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelTier;

    #[tokio::test]
    async fn test_sequence_is_replayed_then_exhausted() {
        let ok = StructuredVerdict::from_value(serde_json::json!({"n": 1})).unwrap();
        let mock = MockScorer::sequence(vec![Ok(ok.clone())]);
        let request = ScoreRequest::new("p".into(), ModelTier::Fast);

        assert_eq!(mock.evaluate(&request).await.unwrap(), ok);
        assert!(mock.evaluate(&request).await.is_err());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests()[0].prompt, "p");
    }
}
