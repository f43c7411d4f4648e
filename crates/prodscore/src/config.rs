//! Configuration file support for prodscore.
//!
//! Loads settings from `prodscore.toml` in the working directory and merges
//! them with command-line flags. Flags win over the file, the file wins over
//! built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use prodscore_scorer::{ApiFlavor, GatewayConfig, ModelTier, ScorerConfig, DEFAULT_TEMPERATURE};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "prodscore.toml";

/// Environment variables checked for the API key, in order
pub const API_KEY_VARS: &[&str] = &["QWEN_API_KEY", "DASHSCOPE_API_KEY"];

/// Settings loaded from `prodscore.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Model tier name or concrete model id
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// `native` or `compatible`
    pub api_flavor: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub gateway: GatewaySection,
}

/// The `[gateway]` table
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub min_delay_ms: Option<u64>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub concurrency: Option<usize>,
    pub min_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Everything a run needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: ModelTier,
    pub temperature: f32,
    pub scorer: ScorerConfig,
    pub gateway: GatewayConfig,
    /// Rows processed at once
    pub concurrency: usize,
}

impl Settings {
    /// Merge flags, file and defaults. `env` looks up environment variables.
    pub fn resolve(
        file: &ProjectConfig,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let model = match overrides.model.as_deref().or(file.model.as_deref()) {
            Some(name) => name.parse::<ModelTier>().map_err(anyhow::Error::msg)?,
            None => ModelTier::default(),
        };

        let api_key = overrides
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                API_KEY_VARS
                    .iter()
                    .filter_map(|var| env(var))
                    .find(|k| !k.trim().is_empty())
            })
            .with_context(|| {
                format!(
                    "No API key found. Pass --api-key or set {}",
                    API_KEY_VARS.join(" or ")
                )
            })?;

        let mut scorer = ScorerConfig::new(api_key.trim().to_string());
        if let Some(url) = &file.base_url {
            scorer = scorer.with_base_url(url.clone());
        }
        if let Some(flavor) = &file.api_flavor {
            scorer = scorer.with_flavor(flavor.parse::<ApiFlavor>().map_err(anyhow::Error::msg)?);
        }
        if let Some(secs) = file.timeout_secs {
            scorer = scorer.with_timeout(Duration::from_secs(secs));
        }

        let section = &file.gateway;
        let defaults = GatewayConfig::default();
        let concurrency = overrides
            .concurrency
            .or(section.concurrency)
            .unwrap_or(defaults.concurrency)
            .max(1);
        let gateway = GatewayConfig::default()
            .with_max_retries(
                overrides
                    .max_retries
                    .or(section.max_retries)
                    .unwrap_or(defaults.max_retries),
            )
            .with_backoff(
                section
                    .initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_backoff),
                section
                    .max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_backoff),
            )
            .with_concurrency(concurrency)
            .with_min_delay(
                overrides
                    .min_delay_ms
                    .or(section.min_delay_ms)
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.min_delay),
            );

        let temperature = file.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            anyhow::bail!("temperature must be between 0 and 2, got {}", temperature);
        }

        Ok(Self {
            model,
            temperature,
            scorer,
            gateway,
            concurrency,
        })
    }
}
