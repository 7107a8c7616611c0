//! Runtime limits enforced by the settlement core

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

// ================================
// Defaults
// ================================

/// Instruction stack depth of the host, top-level frame included
pub const DEFAULT_MAX_STACK_HEIGHT: usize = 5;
pub const DEFAULT_MAX_ACCOUNTS: usize = 64;
/// Transaction packet budget available to one instruction
pub const DEFAULT_MAX_INSTRUCTION_DATA: usize = 1232;
pub const DEFAULT_MAX_CPI_DATA: usize = 10 * 1024;
pub const DEFAULT_MAX_CPI_ACCOUNTS: usize = 64;
pub const DEFAULT_MAX_SIGNER_SEEDS: usize = 16;

// ================================
// Configuration Types
// ================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum call stack height, including the top-level invocation
    pub max_stack_height: usize,

    /// Maximum accounts in one invocation's table
    pub max_accounts: usize,

    /// Maximum instruction data (discriminator + parameters)
    pub max_instruction_data: usize,

    /// Maximum data carried by one cross-program instruction
    pub max_cpi_data: usize,

    /// Maximum account metas in one cross-program instruction
    pub max_cpi_accounts: usize,

    /// Maximum signer-seed lists in one cross-program call
    pub max_signer_seeds: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_stack_height: DEFAULT_MAX_STACK_HEIGHT,
            max_accounts: DEFAULT_MAX_ACCOUNTS,
            max_instruction_data: DEFAULT_MAX_INSTRUCTION_DATA,
            max_cpi_data: DEFAULT_MAX_CPI_DATA,
            max_cpi_accounts: DEFAULT_MAX_CPI_ACCOUNTS,
            max_signer_seeds: DEFAULT_MAX_SIGNER_SEEDS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl RuntimeConfig {
    /// Parse and validate a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?.with_env_overrides()?;
        tracing::debug!(path = %path.display(), ?config, "loaded runtime config");
        Ok(config)
    }

    /// Apply `SETTLEMENT_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let fields: [(&str, &mut usize); 6] = [
            ("SETTLEMENT_MAX_STACK_HEIGHT", &mut self.max_stack_height),
            ("SETTLEMENT_MAX_ACCOUNTS", &mut self.max_accounts),
            ("SETTLEMENT_MAX_INSTRUCTION_DATA", &mut self.max_instruction_data),
            ("SETTLEMENT_MAX_CPI_DATA", &mut self.max_cpi_data),
            ("SETTLEMENT_MAX_CPI_ACCOUNTS", &mut self.max_cpi_accounts),
            ("SETTLEMENT_MAX_SIGNER_SEEDS", &mut self.max_signer_seeds),
        ];
        for (name, field) in fields {
            if let Some(raw) = lookup(name) {
                *field = raw.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("{name} must be an unsigned integer, got {raw:?}"))
                })?;
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stack_height < 1 {
            return Err(ConfigError::Invalid(
                "max_stack_height must be at least 1".to_string(),
            ));
        }
        let limits = [
            ("max_accounts", self.max_accounts),
            ("max_instruction_data", self.max_instruction_data),
            ("max_cpi_data", self.max_cpi_data),
            ("max_cpi_accounts", self.max_cpi_accounts),
            ("max_signer_seeds", self.max_signer_seeds),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
        }
        Ok(())
    }
}
