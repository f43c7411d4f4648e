mod dashscope;
mod gateway;
mod mock;
pub mod normalize;
mod traits;
mod verdict;

pub use dashscope::DashScopeScorer;
pub use gateway::{GatewayConfig, ScorerGateway};
pub use mock::MockScorer;
pub use traits::{
    ApiFlavor, ModelTier, ScoreRequest, Scorer, ScorerConfig, ScoringError, DEFAULT_TEMPERATURE,
    EXCERPT_LEN,
};
pub use verdict::StructuredVerdict;

/// Create the HTTP scorer for the given connection settings
pub fn create_scorer(config: ScorerConfig) -> Result<Box<dyn Scorer>, ScoringError> {
    Ok(Box::new(DashScopeScorer::new(config)?))
}
