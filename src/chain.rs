use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Middleware, PendingTransaction};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockNumber, Bytes, TransactionReceipt, TxHash, U256,
};
use tracing::debug;

pub type ChainError = Box<dyn std::error::Error + Send + Sync>;

/// The chain operations the deployer relies on. Signing, nonce management
/// and timeouts are left to the implementation.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError>;

    async fn latest_block_gas_limit(&self) -> Result<U256, ChainError>;

    async fn send_transaction(
        &self,
        tx: TypedTransaction,
    ) -> Result<TxHash, ChainError>;

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, ChainError>;
}

#[async_trait]
impl<T> ChainClient for Arc<T>
where
    T: ChainClient + ?Sized,
{
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        (**self).get_code(address).await
    }

    async fn latest_block_gas_limit(&self) -> Result<U256, ChainError> {
        (**self).latest_block_gas_limit().await
    }

    async fn send_transaction(
        &self,
        tx: TypedTransaction,
    ) -> Result<TxHash, ChainError> {
        (**self).send_transaction(tx).await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, ChainError> {
        (**self).wait_for_receipt(tx_hash).await
    }
}

/// Optional overrides for the deployment transaction.
#[derive(Debug, Clone, Default)]
pub struct TxParams {
    pub gas_limit: Option<U256>,
    pub value: Option<U256>,
}

impl TxParams {
    pub fn with_gas_limit(mut self, gas_limit: impl Into<U256>) -> Self {
        self.gas_limit = Some(gas_limit.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<U256>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// [`ChainClient`] backed by an ethers middleware stack, typically a
/// `SignerMiddleware` over an HTTP provider.
#[derive(Debug)]
pub struct MiddlewareChain<M> {
    client: Arc<M>,
}

impl<M> MiddlewareChain<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }
}

#[async_trait]
impl<M> ChainClient for MiddlewareChain<M>
where
    M: Middleware + 'static,
    M::Error: 'static,
{
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self.client.get_code(address, None).await?)
    }

    async fn latest_block_gas_limit(&self) -> Result<U256, ChainError> {
        let block = self
            .client
            .get_block(BlockNumber::Latest)
            .await?
            .ok_or("latest block is not available")?;

        Ok(block.gas_limit)
    }

    async fn send_transaction(
        &self,
        mut tx: TypedTransaction,
    ) -> Result<TxHash, ChainError> {
        self.client.fill_transaction(&mut tx, None).await?;

        debug!(?tx, "Sending transaction");

        let pending = self.client.send_transaction(tx, None).await?;

        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, ChainError> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .await?
            .ok_or("transaction was dropped from the mempool")?;

        Ok(receipt)
    }
}
