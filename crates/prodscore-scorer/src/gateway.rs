use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use crate::{ScoreRequest, Scorer, ScoringError, StructuredVerdict};

/// Retry and throttling settings for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Retries after the first attempt, for retryable errors only
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Maximum number of calls in flight at once
    pub concurrency: usize,
    /// Minimum spacing between the start of two calls
    pub min_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            concurrency: 1,
            min_delay: Duration::ZERO,
        }
    }
}

impl GatewayConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }
}

/// Single entry point for every scoring call.
///
/// Validates the request, applies the concurrency cap and minimum call
/// spacing, and retries retryable failures with exponential backoff.
/// Non-retryable failures (auth, malformed responses) are returned at once.
pub struct ScorerGateway {
    scorer: Arc<dyn Scorer>,
    config: GatewayConfig,
    permits: Semaphore,
    last_call: Mutex<Option<Instant>>,
    calls: AtomicU64,
}

impl ScorerGateway {
    pub fn new(scorer: Arc<dyn Scorer>, config: GatewayConfig) -> Self {
        let permits = Semaphore::new(config.concurrency.max(1));
        Self {
            scorer,
            config,
            permits,
            last_call: Mutex::new(None),
            calls: AtomicU64::new(0),
        }
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// Number of outbound calls issued so far, retries included
    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub async fn evaluate(&self, request: &ScoreRequest) -> Result<StructuredVerdict, ScoringError> {
        request.validate()?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = self.call_once(request).await;
            match result {
                Ok(verdict) => return Ok(verdict),
                Err(e) => {
                    if attempt > self.config.max_retries || !e.is_retryable() {
                        debug!(attempt, error = %e, "Scoring call failed, giving up");
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Scoring call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn call_once(&self, request: &ScoreRequest) -> Result<StructuredVerdict, ScoringError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ScoringError::rejected("scorer gateway is closed"))?;
        self.wait_for_slot().await;
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.scorer.evaluate(request).await
    }

    /// Enforce the minimum delay between call starts
    async fn wait_for_slot(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.config.min_delay {
                tokio::time::sleep(self.config.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    Duration::from_millis(capped_ms.saturating_add(pseudo_jitter_ms(jitter_cap)))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % (max_inclusive + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockScorer, ModelTier};

    fn fast_config(max_retries: u32) -> GatewayConfig {
        GatewayConfig::default()
            .with_max_retries(max_retries)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(2))
    }

    fn request() -> ScoreRequest {
        ScoreRequest::new("score".into(), ModelTier::Fast)
    }

    fn ok_verdict() -> StructuredVerdict {
        StructuredVerdict::from_value(serde_json::json!({"ok": true})).unwrap()
    }

    #[tokio::test]
    async fn test_retries_transport_errors_then_gives_up() {
        let scorer = Arc::new(MockScorer::new(|_| Err(ScoringError::transport("connection reset"))));
        let gateway = ScorerGateway::new(scorer.clone(), fast_config(2));

        let result = gateway.evaluate(&request()).await;
        assert!(matches!(result, Err(ScoringError::Transport { .. })));
        assert_eq!(scorer.call_count(), 3);
        assert_eq!(gateway.calls_made(), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let scorer = Arc::new(MockScorer::sequence(vec![
            Err(ScoringError::transport("503")),
            Ok(ok_verdict()),
        ]));
        let gateway = ScorerGateway::new(scorer.clone(), fast_config(3));

        assert!(gateway.evaluate(&request()).await.is_ok());
        assert_eq!(scorer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_auth_and_malformed_are_not_retried() {
        let scorer = Arc::new(MockScorer::new(|_| Err(ScoringError::Auth("bad key".into()))));
        let gateway = ScorerGateway::new(scorer.clone(), fast_config(5));
        assert!(matches!(
            gateway.evaluate(&request()).await,
            Err(ScoringError::Auth(_))
        ));
        assert_eq!(scorer.call_count(), 1);

        let scorer = Arc::new(MockScorer::new(|_| Err(ScoringError::malformed("garbage", "<html>"))));
        let gateway = ScorerGateway::new(scorer.clone(), fast_config(5));
        assert!(gateway.evaluate(&request()).await.is_err());
        assert_eq!(scorer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_prompt_never_reaches_scorer() {
        let scorer = Arc::new(MockScorer::new(|_| Ok(ok_verdict())));
        let gateway = ScorerGateway::new(scorer.clone(), fast_config(0));

        let empty = ScoreRequest::new(String::new(), ModelTier::Fast);
        assert!(matches!(
            gateway.evaluate(&empty).await,
            Err(ScoringError::InvalidRequest(_))
        ));
        assert_eq!(scorer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_min_delay_spaces_calls() {
        let scorer = Arc::new(MockScorer::new(|_| Ok(ok_verdict())));
        let config = fast_config(0).with_min_delay(Duration::from_millis(30));
        let gateway = ScorerGateway::new(scorer, config);

        let start = Instant::now();
        for _ in 0..3 {
            gateway.evaluate(&request()).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_backoff_is_capped() {
        let delay = backoff_delay(Duration::from_millis(100), Duration::from_millis(400), 10);
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(500));

        let first = backoff_delay(Duration::from_millis(100), Duration::from_secs(10), 0);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
    }
}
