use crate::{Error, Result};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use futures::future;
use futures::stream::{LocalBoxStream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tracing::*;

/// Upper bound for a single node request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The parts of a block header the bundle flow looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHead {
    pub number: U64,
    pub base_fee_per_gas: Option<U256>,
}

/// Stream of new chain head numbers. Dropping it unsubscribes.
pub type BlockStream<'a> = LocalBoxStream<'a, U64>;

/// Read access to the chain, as needed to price, sign and track a bundle.
///
/// Implemented by [`TimedNode`] for any ethers transport; tests provide their own.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Number and base fee of the latest block.
    async fn latest_block(&self) -> Result<BlockHead>;

    /// Nonce for the next transaction of `address`, pending transactions included.
    async fn pending_nonce(&self, address: Address) -> Result<U256>;

    /// Number of transactions `address` had sent as of `block`.
    async fn nonce_at(&self, address: Address, block: U64) -> Result<U256>;

    /// Gas units `tx` would use against the latest state.
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;

    /// The node's `(max_fee_per_gas, max_priority_fee_per_gas)` suggestion.
    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256)>;

    /// Balance of `address` at the latest block, in wei.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Receipt of `hash`, if it has been mined.
    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>>;
}

/// Source of new block heads.
#[allow(async_fn_in_trait)]
pub trait BlockSource {
    /// Subscribes to new block heads.
    async fn subscribe_heads(&self) -> Result<BlockStream<'_>>;
}

/// A [`Provider`] whose every request is bounded by a timeout.
#[derive(Debug, Clone)]
pub struct TimedNode<P> {
    provider: Provider<P>,
    timeout: Duration,
}

impl<P: JsonRpcClient> TimedNode<P> {
    pub fn new(provider: Provider<P>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &Provider<P> {
        &self.provider
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(response) => response.map_err(Into::into),
            Err(_) => {
                warn!(timeout = ?self.timeout, "node request timed out");
                Err(Error::Timeout(self.timeout))
            }
        }
    }
}

impl<P: JsonRpcClient> ChainClient for TimedNode<P> {
    #[instrument(skip(self))]
    async fn latest_block(&self) -> Result<BlockHead> {
        let block = self
            .bounded(self.provider.get_block(BlockNumber::Latest))
            .await?
            .ok_or(Error::IncompleteBlock("latest", "header"))?;

        Ok(BlockHead {
            number: block
                .number
                .ok_or(Error::IncompleteBlock("latest", "number"))?,
            base_fee_per_gas: block.base_fee_per_gas,
        })
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256> {
        self.bounded(
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    async fn nonce_at(&self, address: Address, block: U64) -> Result<U256> {
        self.bounded(
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Number(block).into())),
        )
        .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        self.bounded(self.provider.estimate_gas(tx, None)).await
    }

    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256)> {
        self.bounded(self.provider.estimate_eip1559_fees(None)).await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.bounded(self.provider.get_balance(address, None)).await
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        self.bounded(self.provider.get_transaction_receipt(hash))
            .await
    }
}

impl<P: PubsubClient> BlockSource for TimedNode<P> {
    async fn subscribe_heads(&self) -> Result<BlockStream<'_>> {
        let subscription = self.bounded(self.provider.subscribe_blocks()).await?;
        debug!(id = ?subscription.id, "subscribed to new heads");

        Ok(subscription
            .filter_map(|block| future::ready(block.number))
            .boxed_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_within_the_timeout() {
        let (provider, mock) = Provider::<MockProvider>::mocked();
        mock.push::<U256, _>(U256::from(7)).unwrap();
        let node = TimedNode::new(provider);

        assert_eq!(node.pending_nonce(Address::zero()).await.unwrap(), U256::from(7));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_requests_time_out() {
        let (provider, _mock) = Provider::<MockProvider>::mocked();
        let node = TimedNode::new(provider).with_timeout(Duration::from_secs(3));

        let stalled = future::pending::<std::result::Result<U256, ProviderError>>();

        assert!(matches!(
            node.bounded(stalled).await,
            Err(Error::Timeout(timeout)) if timeout == Duration::from_secs(3)
        ));
    }
}
