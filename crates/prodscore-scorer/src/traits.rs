use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::StructuredVerdict;

/// Number of raw payload characters kept for malformed-response diagnostics
pub const EXCERPT_LEN: usize = 500;

/// Sampling temperature used for every evaluation call
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Errors that can occur while scoring
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Malformed response: {reason} (excerpt: {excerpt})")]
    MalformedResponse { reason: String, excerpt: String },

    #[error("Invalid scoring request: {0}")]
    InvalidRequest(String),
}

impl ScoringError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Build a malformed-response error, keeping only the head of the raw payload
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            excerpt: raw.chars().take(EXCERPT_LEN).collect(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoringError::Transport { retryable: true, .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoringError::Auth(_))
    }
}

/// Model tiers offered by the scoring service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    #[default]
    Balanced,
    Accurate,
}

impl ModelTier {
    /// Concrete model id sent on the wire
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelTier::Fast => "qwen-turbo",
            ModelTier::Balanced => "qwen-plus",
            ModelTier::Accurate => "qwen-max",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model_id())
    }
}

impl std::str::FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "turbo" | "qwen-turbo" => Ok(ModelTier::Fast),
            "balanced" | "plus" | "qwen-plus" => Ok(ModelTier::Balanced),
            "accurate" | "max" | "qwen-max" => Ok(ModelTier::Accurate),
            _ => Err(format!("Unknown model tier: {}", s)),
        }
    }
}

/// Which request/response dialect the HTTP scorer speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// DashScope native text-generation endpoint
    #[default]
    Native,
    /// OpenAI-compatible chat completions endpoint
    Compatible,
}

impl std::str::FromStr for ApiFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" | "dashscope" => Ok(ApiFlavor::Native),
            "compatible" | "openai" => Ok(ApiFlavor::Compatible),
            _ => Err(format!("Unknown API flavor: {}", s)),
        }
    }
}

/// Connection settings for the HTTP scorer
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub api_key: String,
    pub base_url: String,
    pub flavor: ApiFlavor,
    pub timeout: Duration,
}

impl ScorerConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://dashscope.aliyuncs.com";

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            flavor: ApiFlavor::default(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A single evaluation call
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    /// Optional system message
    pub system: Option<String>,
    /// User prompt; must be non-empty
    pub prompt: String,
    pub model: ModelTier,
    pub temperature: f32,
}

impl ScoreRequest {
    pub fn new(prompt: String, model: ModelTier) -> Self {
        Self {
            system: None,
            prompt,
            model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_system(mut self, system: String) -> Self {
        self.system = Some(system);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.prompt.trim().is_empty() {
            return Err(ScoringError::InvalidRequest("prompt is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ScoringError::InvalidRequest(format!(
                "temperature {} out of range",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// An external text-evaluation capability
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Human-readable name of the scorer
    fn name(&self) -> &str;

    /// Perform one call and return the normalized verdict object
    async fn evaluate(&self, request: &ScoreRequest) -> Result<StructuredVerdict, ScoringError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_tier_parsing() {
        assert_eq!("fast".parse::<ModelTier>().unwrap(), ModelTier::Fast);
        assert_eq!("qwen-plus".parse::<ModelTier>().unwrap(), ModelTier::Balanced);
        assert_eq!("MAX".parse::<ModelTier>().unwrap(), ModelTier::Accurate);
        assert!("gpt-4".parse::<ModelTier>().is_err());
    }

    #[test]
    fn test_request_validation() {
        let empty = ScoreRequest::new("   ".into(), ModelTier::Fast);
        assert!(matches!(
            empty.validate(),
            Err(ScoringError::InvalidRequest(_))
        ));

        let ok = ScoreRequest::new("score this".into(), ModelTier::Fast);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_error_classification() {
        assert!(ScoringError::transport("reset").is_retryable());
        assert!(!ScoringError::rejected("bad request").is_retryable());
        assert!(!ScoringError::Auth("nope".into()).is_retryable());
        assert!(ScoringError::Auth("nope".into()).is_fatal());

        let long = "x".repeat(2000);
        match ScoringError::malformed("not json", &long) {
            ScoringError::MalformedResponse { excerpt, .. } => {
                assert_eq!(excerpt.len(), EXCERPT_LEN)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
