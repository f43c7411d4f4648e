use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, trace};

use crate::normalize::normalize_response;
use crate::{ApiFlavor, ScoreRequest, Scorer, ScorerConfig, ScoringError, StructuredVerdict};

/// Maximum number of error-body bytes kept in error messages
const MAX_ERROR_BODY: usize = 2048;

/// Scorer backed by the DashScope (Qwen) HTTP API
pub struct DashScopeScorer {
    client: Client,
    config: ScorerConfig,
}

impl DashScopeScorer {
    pub fn new(config: ScorerConfig) -> Result<Self, ScoringError> {
        if config.api_key.trim().is_empty() {
            return Err(ScoringError::Auth("API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("prodscore/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScoringError::rejected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }
}

#[async_trait]
impl Scorer for DashScopeScorer {
    fn name(&self) -> &str {
        "DashScope"
    }

    async fn evaluate(&self, request: &ScoreRequest) -> Result<StructuredVerdict, ScoringError> {
        let url = endpoint(self.config.flavor, &self.config.base_url);
        let payload = build_payload(self.config.flavor, request);

        debug!(
            url = %url,
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending scoring request"
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::transport(format!("request timed out: {}", e))
                } else {
                    ScoringError::transport(format!("request failed: {}", e))
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ScoringError::transport(format!("failed to read response body: {}", e)))?;

        debug!(
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis(),
            body_len = body.len(),
            "Scoring response received"
        );
        trace!(body = %body, "raw scoring response");

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        normalize_response(&body)
    }
}

/// Endpoint URL for the configured wire flavour
pub fn endpoint(flavor: ApiFlavor, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match flavor {
        ApiFlavor::Native => format!("{}/api/v1/services/aigc/text-generation/generation", base),
        ApiFlavor::Compatible => format!("{}/compatible-mode/v1/chat/completions", base),
    }
}

/// Request body for the configured wire flavour
pub fn build_payload(flavor: ApiFlavor, request: &ScoreRequest) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": request.prompt}));

    match flavor {
        ApiFlavor::Native => json!({
            "model": request.model.model_id(),
            "input": {"messages": messages},
            "parameters": {
                "temperature": request.temperature,
                "result_format": "message",
            },
        }),
        ApiFlavor::Compatible => json!({
            "model": request.model.model_id(),
            "messages": messages,
            "temperature": request.temperature,
        }),
    }
}

/// Map a non-success HTTP response onto the scoring error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> ScoringError {
    let body = truncate(body, MAX_ERROR_BODY);
    let (code, message) = service_error(body);
    let detail = format!(
        "HTTP {}{}: {}",
        status.as_u16(),
        code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default(),
        message.as_deref().unwrap_or(body)
    );

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code.as_deref() == Some("InvalidApiKey")
    {
        return ScoringError::Auth(detail);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return ScoringError::transport(detail);
    }
    ScoringError::rejected(detail)
}

/// Extract `code` / `message` from a service error body (native or compatible)
fn service_error(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };
    let node = value.get("error").unwrap_or(&value);
    let code = node
        .get("code")
        .and_then(|c| c.as_str().map(String::from).or_else(|| Some(c.to_string())))
        .filter(|c| c != "null");
    let message = node.get("message").and_then(Value::as_str).map(String::from);
    (code, message)
}

fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelTier;

    fn request() -> ScoreRequest {
        ScoreRequest::new("Evaluate this title".into(), ModelTier::Balanced)
            .with_system("You are an evaluator".into())
    }

    #[test]
    fn test_native_payload() {
        let payload = build_payload(ApiFlavor::Native, &request());
        assert_eq!(payload["model"], "qwen-plus");
        assert_eq!(payload["input"]["messages"][0]["role"], "system");
        assert_eq!(payload["input"]["messages"][1]["content"], "Evaluate this title");
        assert_eq!(payload["parameters"]["result_format"], "message");
    }

    #[test]
    fn test_compatible_payload() {
        let payload = build_payload(ApiFlavor::Compatible, &request());
        assert_eq!(payload["messages"].as_array().unwrap().len(), 2);
        assert!(payload.get("input").is_none());
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            endpoint(ApiFlavor::Native, "https://dashscope.aliyuncs.com/"),
            "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation"
        );
        assert_eq!(
            endpoint(ApiFlavor::Compatible, "http://localhost:8080"),
            "http://localhost:8080/compatible-mode/v1/chat/completions"
        );
    }

    #[test]
    fn test_status_classification() {
        let auth = classify_status(
            StatusCode::UNAUTHORIZED,
            r#"{"code":"InvalidApiKey","message":"Invalid API-key provided."}"#,
        );
        assert!(matches!(auth, ScoringError::Auth(ref m) if m.contains("InvalidApiKey")));

        let auth_by_code = classify_status(StatusCode::BAD_REQUEST, r#"{"code":"InvalidApiKey"}"#);
        assert!(auth_by_code.is_fatal());

        let throttled = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(throttled.is_retryable());

        let unavailable = classify_status(StatusCode::BAD_GATEWAY, "");
        assert!(unavailable.is_retryable());

        let bad_request = classify_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"invalid_parameter","message":"temperature too high"}}"#,
        );
        assert!(!bad_request.is_retryable());
        assert!(bad_request.to_string().contains("temperature too high"));
    }

    #[test]
    fn test_empty_key_is_auth_error() {
        let result = DashScopeScorer::new(ScorerConfig::new("  ".into()));
        assert!(matches!(result, Err(ScoringError::Auth(_))));
    }
}
