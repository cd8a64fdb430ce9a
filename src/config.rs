use std::path::Path;

use ethers::types::Address;
use eyre::Context;
use serde::{Deserialize, Serialize};

use crate::address::SINGLETON_FACTORY;
use crate::deployer::{validate_gas_limit_percent, DEFAULT_GAS_LIMIT_PERCENT};
use crate::verify::compiler_version::COMPILER_LIST_URL;

pub const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";
pub const MINIMAL_VERIFIER_ACCESS_KEY_ENV: &str = "MINIMAL_VERIFIER_ACCESS_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub deployer: DeployerConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    #[serde(default = "default::factory_address")]
    pub factory_address: Address,

    /// Share of the latest block gas limit used when the caller gives none
    #[serde(default = "default::gas_limit_percent")]
    pub gas_limit_percent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Network name sent along with every verification request
    pub network: String,

    #[serde(default = "default::compiler_list_url")]
    pub compiler_list_url: String,

    pub minimal_verifier_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal_verifier_access_key: Option<String>,

    pub etherscan_api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etherscan_api_key: Option<String>,

    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default::poll_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default::max_status_checks")]
    pub max_status_checks: u32,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            factory_address: default::factory_address(),
            gas_limit_percent: default::gas_limit_percent(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default::poll_interval_secs(),
            max_status_checks: default::max_status_checks(),
        }
    }
}

impl Config {
    /// Reads the YAML config at `path`, then applies `.env` and environment
    /// overrides for the API keys.
    pub async fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| {
                format!("Reading config file {}", path.display())
            })?;

        let mut config: Self = serde_yaml::from_str(&content)
            .with_context(|| {
                format!("Parsing config file {}", path.display())
            })?;

        dotenv::dotenv().ok();

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var(ETHERSCAN_API_KEY_ENV) {
            self.verification.etherscan_api_key = Some(key);
        }

        if let Some(key) = var(MINIMAL_VERIFIER_ACCESS_KEY_ENV) {
            self.verification.minimal_verifier_access_key = Some(key);
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        self.deployer.validate()?;
        self.verification.poll.validate()?;

        Ok(())
    }
}

impl DeployerConfig {
    pub fn validate(&self) -> eyre::Result<()> {
        validate_gas_limit_percent(self.gas_limit_percent)
    }
}

impl PollConfig {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.max_status_checks == 0 {
            eyre::bail!("poll.max_status_checks must be at least 1");
        }

        Ok(())
    }
}

mod default {
    use super::*;

    pub fn factory_address() -> Address {
        SINGLETON_FACTORY
    }

    pub fn gas_limit_percent() -> u64 {
        DEFAULT_GAS_LIMIT_PERCENT
    }

    pub fn compiler_list_url() -> String {
        COMPILER_LIST_URL.to_string()
    }

    pub fn poll_interval_secs() -> u64 {
        5
    }

    pub fn max_status_checks() -> u32 {
        30
    }
}
