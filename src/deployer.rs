use std::sync::Arc;

use ethers::abi::{Abi, AbiEncode, Tokenize};
use ethers::contract::Contract;
use ethers::providers::Middleware;
use ethers::types::{Address, Eip1559TransactionRequest, TxHash, U256};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::abis::DeployCall;
use crate::address::{address_from_data, SINGLETON_FACTORY, ZERO_SALT};
use crate::artifact::ContractArtifact;
use crate::chain::{ChainClient, ChainError, TxParams};
use crate::config::DeployerConfig;

pub const DEFAULT_GAS_LIMIT_PERCENT: u64 = 40;

pub fn validate_gas_limit_percent(percent: u64) -> eyre::Result<()> {
    if !(1..=100).contains(&percent) {
        eyre::bail!("gas_limit_percent must be within 1..=100, got {percent}");
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("cannot encode creation bytecode for {name}: {reason}")]
    Encoding { name: String, reason: String },

    #[error("failed to query code of {name} at {address:?}")]
    ChainQuery {
        name: String,
        address: Address,
        #[source]
        source: ChainError,
    },

    #[error("failed to estimate gas for {name} at {address:?}")]
    GasEstimation {
        name: String,
        address: Address,
        #[source]
        source: ChainError,
    },

    #[error("deployment transaction for {name} at {address:?} failed")]
    DeploymentTransaction {
        name: String,
        address: Address,
        #[source]
        source: ChainError,
    },

    #[error(
        "{name} has no code at {address:?} after transaction {tx_hash:?} was mined"
    )]
    DeploymentConfirmation {
        name: String,
        address: Address,
        tx_hash: TxHash,
    },
}

/// A contract bound to its deterministic address.
#[derive(Debug, Clone)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub abi: Abi,
    /// Whether this call sent the deployment, `false` if the code was
    /// already on chain
    pub deployed: bool,
}

impl DeployedContract {
    pub fn attach<M: Middleware>(&self, client: Arc<M>) -> Contract<M> {
        Contract::new(self.address, self.abi.clone(), client)
    }
}

/// Deploys contracts through the singleton factory, at most once per
/// creation bytecode. The chain is the only source of truth: every call
/// checks for existing code before sending anything.
#[derive(Debug)]
pub struct Deployer<C> {
    chain: C,
    factory: Address,
    gas_limit_percent: u64,
}

impl<C> Deployer<C>
where
    C: ChainClient,
{
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            factory: SINGLETON_FACTORY,
            gas_limit_percent: DEFAULT_GAS_LIMIT_PERCENT,
        }
    }

    pub fn from_config(
        chain: C,
        config: &DeployerConfig,
    ) -> eyre::Result<Self> {
        config.validate()?;

        Ok(Self {
            chain,
            factory: config.factory_address,
            gas_limit_percent: config.gas_limit_percent,
        })
    }

    /// Share of the latest block gas limit used when no gas limit is given,
    /// in 1..=100.
    pub fn with_gas_limit_percent(
        mut self,
        gas_limit_percent: u64,
    ) -> eyre::Result<Self> {
        validate_gas_limit_percent(gas_limit_percent)?;

        self.gas_limit_percent = gas_limit_percent;
        Ok(self)
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Address `artifact` will have once deployed with `args`, without
    /// touching the chain.
    pub fn address_of(
        &self,
        artifact: &ContractArtifact,
        args: impl Tokenize,
    ) -> Result<Address, DeployError> {
        let init_code = artifact.creation_data(args)?;

        Ok(address_from_data(init_code, self.factory))
    }

    #[instrument(
        skip(self, artifact, params, args),
        fields(factory = ?self.factory)
    )]
    pub async fn deploy(
        &self,
        name: &str,
        artifact: &ContractArtifact,
        params: TxParams,
        args: impl Tokenize,
    ) -> Result<DeployedContract, DeployError> {
        let init_code = artifact.creation_data(args)?;
        let address = address_from_data(&init_code, self.factory);

        let handle = |deployed| DeployedContract {
            name: name.to_string(),
            address,
            abi: artifact.abi.clone(),
            deployed,
        };

        if self.has_code(name, address).await? {
            info!("{name} already deployed at {address:?}, skipping");
            return Ok(handle(false));
        }

        let gas_limit = match params.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.estimate_gas_limit(name, address).await?,
        };

        let call = DeployCall {
            init_code,
            salt: ZERO_SALT,
        };

        let mut tx = Eip1559TransactionRequest::new()
            .to(self.factory)
            .data(call.encode())
            .gas(gas_limit);

        if let Some(value) = params.value {
            tx = tx.value(value);
        }

        let transaction_error =
            |source: ChainError| DeployError::DeploymentTransaction {
                name: name.to_string(),
                address,
                source,
            };

        info!("Deploying {name} to {address:?} with gas limit {gas_limit}");

        let tx_hash = self
            .chain
            .send_transaction(tx.into())
            .await
            .map_err(transaction_error)?;

        let receipt = self
            .chain
            .wait_for_receipt(tx_hash)
            .await
            .map_err(transaction_error)?;

        // Pre-byzantium receipts carry no status, the code check decides
        if receipt.status == Some(0.into()) {
            return Err(transaction_error(
                format!("transaction {tx_hash:?} reverted").into(),
            ));
        }

        if !self.has_code(name, address).await? {
            warn!("{name} is missing at {address:?} after {tx_hash:?}");

            return Err(DeployError::DeploymentConfirmation {
                name: name.to_string(),
                address,
                tx_hash,
            });
        }

        info!("Deployed {name} at {address:?} in {tx_hash:?}");

        Ok(handle(true))
    }

    async fn has_code(
        &self,
        name: &str,
        address: Address,
    ) -> Result<bool, DeployError> {
        let code = self.chain.get_code(address).await.map_err(|source| {
            DeployError::ChainQuery {
                name: name.to_string(),
                address,
                source,
            }
        })?;

        Ok(!code.is_empty())
    }

    async fn estimate_gas_limit(
        &self,
        name: &str,
        address: Address,
    ) -> Result<U256, DeployError> {
        let block_gas_limit =
            self.chain.latest_block_gas_limit().await.map_err(|source| {
                DeployError::GasEstimation {
                    name: name.to_string(),
                    address,
                    source,
                }
            })?;

        Ok(block_gas_limit * U256::from(self.gas_limit_percent) / 100)
    }
}
