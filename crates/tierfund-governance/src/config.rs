//! Engine configuration.
//!
//! Loaded from TOML at startup. Per-type voting parameters and category
//! limits can later be changed by an admin through the engine; the
//! power coefficient and minimum proposer stake are fixed.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tierfund_types::{Amount, Principal};

use crate::error::GovernanceError;
use crate::proposal::{ProposalConfig, ProposalType};
use crate::treasury::TreasuryCategory;

/// Errors raised while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

/// Voting parameters for all three proposal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConfigs {
    pub high_conviction: ProposalConfig,
    pub experimental: ProposalConfig,
    pub operational: ProposalConfig,
}

impl TypeConfigs {
    pub fn get(&self, proposal_type: ProposalType) -> &ProposalConfig {
        match proposal_type {
            ProposalType::HighConviction => &self.high_conviction,
            ProposalType::Experimental => &self.experimental,
            ProposalType::Operational => &self.operational,
        }
    }

    pub fn set(&mut self, proposal_type: ProposalType, config: ProposalConfig) {
        match proposal_type {
            ProposalType::HighConviction => self.high_conviction = config,
            ProposalType::Experimental => self.experimental = config,
            ProposalType::Operational => self.operational = config,
        }
    }

    pub fn validate(&self) -> Result<(), GovernanceError> {
        for ty in ProposalType::ALL {
            self.get(ty).validate()?;
        }
        Ok(())
    }
}

impl Default for TypeConfigs {
    fn default() -> Self {
        Self {
            high_conviction: ProposalType::HighConviction.default_config(),
            experimental: ProposalType::Experimental.default_config(),
            operational: ProposalType::Operational.default_config(),
        }
    }
}

/// Initial treasury caps. TOML integers are 64-bit, so limits set here
/// are too; the engine itself works in `Amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimits {
    pub high_conviction: u64,
    pub experimental: u64,
    pub operational: u64,
}

impl CategoryLimits {
    pub fn get(&self, category: TreasuryCategory) -> Amount {
        Amount::from(match category {
            TreasuryCategory::HighConviction => self.high_conviction,
            TreasuryCategory::Experimental => self.experimental,
            TreasuryCategory::Operational => self.operational,
        })
    }

    pub fn pairs(&self) -> [(TreasuryCategory, Amount); 3] {
        TreasuryCategory::ALL.map(|c| (c, self.get(c)))
    }
}

impl Default for CategoryLimits {
    fn default() -> Self {
        Self {
            high_conviction: 1_000_000_000,
            experimental: 1_000_000_000,
            operational: 1_000_000_000,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Principal holding `Admin` at startup
    pub admin: Principal,
    #[serde(default)]
    pub proposals: TypeConfigs,
    #[serde(default)]
    pub limits: CategoryLimits,
}

impl GovernanceConfig {
    /// Default parameters administered by `admin`.
    pub fn with_admin(admin: Principal) -> Self {
        Self {
            admin,
            proposals: TypeConfigs::default(),
            limits: CategoryLimits::default(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: GovernanceConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    /// Paths with a `..` component are refused.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ConfigError::Invalid(format!(
                "refusing path with directory traversal: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.is_null() {
            return Err(ConfigError::Invalid("admin must not be the null principal".to_string()));
        }
        self.proposals
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
