use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("tolerance_percent must be a finite number >= 0, got {0}")]
    TolerancePercent(f64),
    #[error("chunk_size must be at least 1")]
    ChunkSize,
}

/// Matching and batch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum distance in days between statement date and due date.
    pub tolerance_days: u32,
    /// Maximum value deviation, as a percentage of the larger amount.
    pub tolerance_percent: f64,
    /// Transactions scored per chunk by the batch orchestrator.
    pub chunk_size: usize,
    /// Payment method name used when a line's own tag does not resolve.
    pub default_payment_method: Option<String>,
    pub default_bank_account: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance_days: 10,
            tolerance_percent: 1.0,
            chunk_size: 50,
            default_payment_method: None,
            default_bank_account: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance_percent.is_finite() || self.tolerance_percent < 0.0 {
            return Err(ConfigError::TolerancePercent(self.tolerance_percent));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ChunkSize);
        }
        Ok(())
    }
}
