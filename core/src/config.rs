//! Configuration for loading files and running conversations.
//!
//! `LensConfig` centralizes container limits, sample sizes, prompt budgets,
//! and backend settings so none of them are hardcoded at call sites.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::ContainerLimits;
use crate::error_codes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions`
    /// suffix.
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    pub limits: ContainerLimits,
    #[serde(alias = "small_rows")]
    pub small_sample_rows: usize,
    #[serde(alias = "large_rows")]
    pub large_sample_rows: usize,
    /// Upper bound on the rendered metadata section of a prompt.
    pub max_context_chars: usize,
    /// Most recent turns sent along with a question.
    pub max_history_turns: usize,
    /// DAX formulas longer than this are cut in the rendered model.
    pub max_formula_chars: usize,
    pub max_sample_cell_chars: usize,
    pub backend: BackendSettings,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            limits: ContainerLimits::default(),
            small_sample_rows: 10,
            large_sample_rows: 200,
            max_context_chars: 24_000,
            max_history_turns: 12,
            max_formula_chars: 400,
            max_sample_cell_chars: 60,
            backend: BackendSettings::default(),
        }
    }
}

impl LensConfig {
    pub fn builder() -> LensConfigBuilder {
        LensConfigBuilder {
            inner: LensConfig::default(),
        }
    }

    #[cfg(feature = "std-fs")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<LensConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let cfg: LensConfig = serde_json::from_str(&text).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_zero(self.small_sample_rows, "small_sample_rows")?;
        ensure_non_zero(self.large_sample_rows, "large_sample_rows")?;
        if self.large_sample_rows < self.small_sample_rows {
            return Err(ConfigError::TierOrder {
                small: self.small_sample_rows,
                large: self.large_sample_rows,
            });
        }
        ensure_non_zero(self.max_context_chars, "max_context_chars")?;
        ensure_non_zero(self.max_formula_chars, "max_formula_chars")?;
        ensure_non_zero(self.max_sample_cell_chars, "max_sample_cell_chars")?;
        ensure_non_zero(self.limits.max_entries, "limits.max_entries")?;

        let temperature = self.backend.temperature;
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature { value: temperature });
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "backend.base_url",
            });
        }
        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "backend.model",
            });
        }
        ensure_non_zero(self.backend.max_tokens as usize, "backend.max_tokens")?;
        ensure_non_zero(self.backend.timeout_secs as usize, "backend.timeout_secs")?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NonPositiveLimit { field: &'static str, value: u64 },
    #[error("large_sample_rows ({large}) must not be smaller than small_sample_rows ({small})")]
    TierOrder { small: usize, large: usize },
    #[error("backend.temperature must be in [0.0, 2.0] and finite (got {value})")]
    InvalidTemperature { value: f64 },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("cannot read config file '{path}': {reason}")]
    Unreadable { path: String, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        error_codes::CONFIG_INVALID
    }
}

fn ensure_non_zero(value: usize, field: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NonPositiveLimit {
            field,
            value: value as u64,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LensConfigBuilder {
    inner: LensConfig,
}

impl Default for LensConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LensConfigBuilder {
    pub fn new() -> Self {
        LensConfig::builder()
    }

    pub fn limits(mut self, value: ContainerLimits) -> Self {
        self.inner.limits = value;
        self
    }

    pub fn small_sample_rows(mut self, value: usize) -> Self {
        self.inner.small_sample_rows = value;
        self
    }

    pub fn large_sample_rows(mut self, value: usize) -> Self {
        self.inner.large_sample_rows = value;
        self
    }

    pub fn max_context_chars(mut self, value: usize) -> Self {
        self.inner.max_context_chars = value;
        self
    }

    pub fn max_history_turns(mut self, value: usize) -> Self {
        self.inner.max_history_turns = value;
        self
    }

    pub fn max_formula_chars(mut self, value: usize) -> Self {
        self.inner.max_formula_chars = value;
        self
    }

    pub fn backend(mut self, value: BackendSettings) -> Self {
        self.inner.backend = value;
        self
    }

    pub fn model(mut self, value: impl Into<String>) -> Self {
        self.inner.backend.model = value.into();
        self
    }

    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.inner.backend.base_url = value.into();
        self
    }

    pub fn build(self) -> Result<LensConfig, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
