//! Fixed identities and in-memory stand-ins for the node and the relay.

use crate::account::AccountIdentity;
use crate::actor::StopHandle;
use crate::api::types::{
    CallBundleParams, CallBundleResponse, CallBundleTxResult, Error as JsonRpcErrorBody,
    JsonRpcResponseDetailedError, JsonRpcResponseError, SendBundleParams, SendBundleResponse,
};
use crate::client::BundleRelay;
use crate::error::RpcError;
use crate::helpers::provider::{
    BlockHead, BlockSource, BlockStream, ChainClient, DEFAULT_REQUEST_TIMEOUT,
};
use crate::{Error, Result};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use futures::stream::{self, StreamExt};
use hex_literal::hex;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// Well-known development keys, never funded on a public chain.
pub const EXECUTOR_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const SPONSOR_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const SNIPER_KEY: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";
pub const AUTH_KEY: &str = "7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6";

pub const EXECUTOR: Address = H160(hex!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
pub const SPONSOR: Address = H160(hex!("70997970C51812dc3A010C7d01b50e0d17dc79C8"));
pub const SNIPER: Address = H160(hex!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"));
pub const AUTH: Address = H160(hex!("90F79bf6EB2c4f870365E785982E1f101E93b906"));

pub const ROUTER: Address = H160(hex!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));
pub const TOKEN: Address = H160(hex!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984"));
pub const WETH: Address = H160(hex!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));

fn identity(key: &str) -> AccountIdentity {
    key.parse().unwrap()
}

pub fn executor() -> AccountIdentity {
    identity(EXECUTOR_KEY)
}

pub fn sponsor() -> AccountIdentity {
    identity(SPONSOR_KEY)
}

pub fn sniper() -> AccountIdentity {
    identity(SNIPER_KEY)
}

pub fn auth() -> AccountIdentity {
    identity(AUTH_KEY)
}

fn node_error(message: &str) -> Error {
    Error::Provider(ProviderError::CustomError(message.to_string()))
}

/// A node with canned answers. Anything not configured fails like an unreachable node.
#[derive(Debug, Default)]
pub struct MockChain {
    head: Option<BlockHead>,
    eip1559_estimate: Option<(U256, U256)>,
    pending_nonces: HashMap<Address, U256>,
    nonces_at: HashMap<Address, U256>,
    gas_estimates: HashMap<Address, U256>,
    balances: HashMap<Address, U256>,
    landed_at: Option<U64>,
    stalled_receipts: bool,
    blocks: Vec<u64>,
    estimated: Mutex<Vec<Option<Address>>>,
}

impl MockChain {
    pub fn with_head(mut self, number: u64, base_fee: U256) -> Self {
        self.head = Some(BlockHead {
            number: number.into(),
            base_fee_per_gas: Some(base_fee),
        });
        self
    }

    pub fn with_eip1559_estimate(mut self, max_fee: U256, priority_fee: U256) -> Self {
        self.eip1559_estimate = Some((max_fee, priority_fee));
        self
    }

    pub fn with_pending_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.pending_nonces.insert(address, nonce.into());
        self
    }

    /// Nonce reported for `address` at any past block. Defaults to its pending nonce.
    pub fn with_nonce_at(mut self, address: Address, nonce: u64) -> Self {
        self.nonces_at.insert(address, nonce.into());
        self
    }

    /// Estimate returned for calls to `to`. Calls to anything else fail to estimate.
    pub fn with_gas_estimate(mut self, to: Address, gas: u64) -> Self {
        self.gas_estimates.insert(to, gas.into());
        self
    }

    pub fn with_balance(mut self, address: Address, wei: U256) -> Self {
        self.balances.insert(address, wei);
        self
    }

    /// Every transaction gets a receipt in `block`.
    pub fn with_bundle_landed_at(mut self, block: u64) -> Self {
        self.landed_at = Some(block.into());
        self
    }

    /// Receipt lookups hang until the request timeout.
    pub fn with_stalled_receipts(mut self) -> Self {
        self.stalled_receipts = true;
        self
    }

    /// Heads delivered by the block subscription, after which it closes.
    pub fn with_blocks(mut self, blocks: impl IntoIterator<Item = u64>) -> Self {
        self.blocks = blocks.into_iter().collect();
        self
    }

    /// Destinations of every gas estimate requested so far.
    pub fn estimated(&self) -> Vec<Option<Address>> {
        self.estimated.lock().unwrap().clone()
    }
}

impl ChainClient for MockChain {
    async fn latest_block(&self) -> Result<BlockHead> {
        self.head.ok_or_else(|| node_error("no latest block"))
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256> {
        Ok(self.pending_nonces.get(&address).copied().unwrap_or_default())
    }

    async fn nonce_at(&self, address: Address, _block: U64) -> Result<U256> {
        match self.nonces_at.get(&address) {
            Some(nonce) => Ok(*nonce),
            None => self.pending_nonce(address).await,
        }
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        let to = tx.to_addr().copied();
        self.estimated.lock().unwrap().push(to);

        to.and_then(|to| self.gas_estimates.get(&to).copied())
            .ok_or_else(|| node_error("execution reverted"))
    }

    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256)> {
        self.eip1559_estimate
            .ok_or_else(|| node_error("eth_feeHistory unsupported"))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.balances.get(&address).copied().unwrap_or_default())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        if self.stalled_receipts {
            tokio::time::sleep(DEFAULT_REQUEST_TIMEOUT).await;
            return Err(Error::Timeout(DEFAULT_REQUEST_TIMEOUT));
        }
        Ok(self.landed_at.map(|block| TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(block),
            ..Default::default()
        }))
    }
}

impl BlockSource for MockChain {
    async fn subscribe_heads(&self) -> Result<BlockStream<'_>> {
        Ok(stream::iter(self.blocks.iter().copied().map(U64::from)).boxed_local())
    }
}

/// Error payload the relay sends back for a rejected request.
pub fn relay_error(message: &str) -> RpcError {
    RpcError::Response(JsonRpcResponseError {
        jsonrpc: Some("2.0".to_string()),
        id: Some(1),
        error: JsonRpcErrorBody::Detailed(JsonRpcResponseDetailedError {
            code: -32000,
            message: message.to_string(),
        }),
    })
}

fn tx_result(gas_used: u64) -> CallBundleTxResult {
    CallBundleTxResult {
        tx_hash: TxHash::zero(),
        from_address: EXECUTOR,
        to_address: Some(ROUTER),
        gas_used,
        gas_price: U256::from(43_000_000_000_u64),
        value: None,
        error: None,
        revert: None,
    }
}

/// Successful simulation of transactions using `gas_used` gas each.
pub fn sim_success(gas_used: &[u64]) -> CallBundleResponse {
    CallBundleResponse {
        bundle_hash: TxHash::zero(),
        bundle_gas_price: U256::from(43_000_000_000_u64),
        coinbase_diff: U256::zero(),
        eth_sent_to_coinbase: U256::zero(),
        gas_fees: U256::zero(),
        results: gas_used.iter().copied().map(tx_result).collect(),
        state_block_number: 100,
        total_gas_used: gas_used.iter().sum(),
    }
}

/// Simulation whose transaction at `index` reverted with `reason`.
pub fn sim_revert(gas_used: &[u64], index: usize, reason: &str) -> CallBundleResponse {
    let mut response = sim_success(gas_used);
    response.results[index].error = Some("execution reverted".to_string());
    response.results[index].revert = Some(reason.to_string());
    response
}

/// A relay answering from queues, successfully once they run dry.
pub struct MockRelay {
    auth: Address,
    simulations: Mutex<VecDeque<std::result::Result<CallBundleResponse, RpcError>>>,
    submissions: Mutex<VecDeque<std::result::Result<SendBundleResponse, RpcError>>>,
    simulated: Mutex<Vec<U64>>,
    submitted: Mutex<Vec<U64>>,
    stop_on_submission: Option<(usize, StopHandle)>,
}

impl Default for MockRelay {
    fn default() -> Self {
        Self {
            auth: AUTH,
            simulations: Default::default(),
            submissions: Default::default(),
            simulated: Default::default(),
            submitted: Default::default(),
            stop_on_submission: None,
        }
    }
}

impl MockRelay {
    pub fn with_simulation(self, result: std::result::Result<CallBundleResponse, RpcError>) -> Self {
        self.simulations.lock().unwrap().push_back(result);
        self
    }

    pub fn with_submission(self, result: std::result::Result<SendBundleResponse, RpcError>) -> Self {
        self.submissions.lock().unwrap().push_back(result);
        self
    }

    /// Stops the actor while the `n`th submission (1-based) is in flight.
    pub fn stopping_on_submission(mut self, n: usize, handle: StopHandle) -> Self {
        self.stop_on_submission = Some((n, handle));
        self
    }

    /// Target blocks of every simulation, in order.
    pub fn simulated(&self) -> Vec<u64> {
        self.simulated.lock().unwrap().iter().map(U64::as_u64).collect()
    }

    /// Target blocks of every submission, in order.
    pub fn submitted(&self) -> Vec<u64> {
        self.submitted.lock().unwrap().iter().map(U64::as_u64).collect()
    }
}

impl BundleRelay for MockRelay {
    fn auth_address(&self) -> Address {
        self.auth
    }

    async fn call_bundle(
        &self,
        params: CallBundleParams,
    ) -> std::result::Result<CallBundleResponse, RpcError> {
        self.simulated.lock().unwrap().push(params.block_number);

        let queued = self.simulations.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(sim_success(&vec![21_000; params.txs.len()])))
    }

    async fn send_bundle(
        &self,
        params: SendBundleParams,
    ) -> std::result::Result<SendBundleResponse, RpcError> {
        let count = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(params.block_number);
            submitted.len()
        };

        if let Some((n, handle)) = &self.stop_on_submission {
            if *n == count {
                handle.stop();
            }
        }

        let queued = self.submissions.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(SendBundleResponse {
                bundle_hash: TxHash::zero(),
            })
        })
    }
}
