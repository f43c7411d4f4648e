//! Response-shape normalization.
//!
//! The scoring service nests the generated text differently depending on the
//! endpoint, model and `result_format`. Every known shape is listed in
//! [`KNOWN_SHAPES`] and tried in order; the first one that yields content
//! wins. A payload matching none of them is rejected, never guessed at.

use serde_json::Value;
use tracing::debug;

use crate::{ScoringError, StructuredVerdict};

/// A known location of the generated text inside a response envelope
#[derive(Debug, Clone, Copy)]
pub struct ResponseShape {
    pub name: &'static str,
    pub pointer: &'static str,
}

/// Known envelope shapes, in priority order
pub const KNOWN_SHAPES: &[ResponseShape] = &[
    ResponseShape {
        name: "dashscope-message",
        pointer: "/output/choices/0/message/content",
    },
    ResponseShape {
        name: "dashscope-text",
        pointer: "/output/text",
    },
    ResponseShape {
        name: "openai-chat",
        pointer: "/choices/0/message/content",
    },
    ResponseShape {
        name: "openai-completion",
        pointer: "/choices/0/text",
    },
];

/// Normalize a raw HTTP response body into a verdict object
pub fn normalize_response(raw: &str) -> Result<StructuredVerdict, ScoringError> {
    let envelope: Value = serde_json::from_str(raw)
        .map_err(|e| ScoringError::malformed(format!("response body is not JSON: {}", e), raw))?;

    let (shape, content) = extract_content(&envelope)
        .ok_or_else(|| ScoringError::malformed("unrecognized response shape", raw))?;

    debug!(shape = shape.name, content_len = content.len(), "Matched response shape");

    parse_verdict_text(&content)
}

/// Find the generated text using the first matching known shape
pub fn extract_content(envelope: &Value) -> Option<(ResponseShape, String)> {
    KNOWN_SHAPES.iter().find_map(|shape| {
        envelope
            .pointer(shape.pointer)
            .and_then(content_text)
            .filter(|text| !text.trim().is_empty())
            .map(|text| (*shape, text))
    })
}

/// Content is either a plain string or a list of `{ "text": ... }` parts
fn content_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        _ => None,
    }
}

/// Parse the model's text output into a verdict object
pub fn parse_verdict_text(content: &str) -> Result<StructuredVerdict, ScoringError> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ScoringError::malformed(format!("verdict is not valid JSON: {}", e), content))?;

    StructuredVerdict::from_value(value)
        .ok_or_else(|| ScoringError::malformed("verdict is not a JSON object", content))
}

/// Strip a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest
    } else if let Some((_, rest)) = text.split_once("```") {
        rest
    } else {
        return text;
    };
    inner.split("```").next().unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERDICT: &str = r#"{"must_have": {"criteria_1_clear_product_type": {"score": 2, "reason": "ok"}}}"#;

    fn assert_has_verdict(result: Result<StructuredVerdict, ScoringError>) {
        let verdict = result.unwrap();
        assert!(verdict.contains_key("must_have"));
    }

    #[test]
    fn test_dashscope_message_shape() {
        let raw = serde_json::json!({
            "output": {"choices": [{"message": {"role": "assistant", "content": VERDICT}}]},
            "usage": {"total_tokens": 10}
        })
        .to_string();
        assert_has_verdict(normalize_response(&raw));
    }

    #[test]
    fn test_dashscope_text_shape() {
        let raw = serde_json::json!({"output": {"text": VERDICT, "finish_reason": "stop"}}).to_string();
        assert_has_verdict(normalize_response(&raw));
    }

    #[test]
    fn test_openai_chat_shape() {
        let raw = serde_json::json!({"choices": [{"message": {"content": VERDICT}}]}).to_string();
        assert_has_verdict(normalize_response(&raw));
    }

    #[test]
    fn test_content_parts_are_joined() {
        let (first, second) = VERDICT.split_at(20);
        let raw = serde_json::json!({
            "choices": [{"message": {"content": [{"text": first}, {"text": second}]}}]
        })
        .to_string();
        assert_has_verdict(normalize_response(&raw));
    }

    #[test]
    fn test_earlier_shape_wins() {
        let envelope = serde_json::json!({
            "output": {"text": "{\"from\": \"text\"}"},
            "choices": [{"message": {"content": "{\"from\": \"chat\"}"}}]
        });
        let (shape, content) = extract_content(&envelope).unwrap();
        assert_eq!(shape.name, "dashscope-text");
        assert!(content.contains("text"));
    }

    #[test]
    fn test_unknown_shape_is_rejected() {
        let raw = r#"{"result": {"answer": "{}"}}"#;
        match normalize_response(raw) {
            Err(ScoringError::MalformedResponse { reason, excerpt }) => {
                assert!(reason.contains("unrecognized"));
                assert!(excerpt.starts_with("{\"result\""));
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[test]
    fn test_non_json_verdict_is_rejected() {
        let raw = serde_json::json!({"output": {"text": "The title looks fine."}}).to_string();
        assert!(matches!(
            normalize_response(&raw),
            Err(ScoringError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_array_verdict_is_rejected() {
        assert!(matches!(
            parse_verdict_text("[1, 2, 3]"),
            Err(ScoringError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("Here:\n```\n{\"a\": 1}\n```\nDone"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }
}
