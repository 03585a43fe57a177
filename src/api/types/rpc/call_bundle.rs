use crate::helpers::DecimalU256;
use derive_builder::{Builder, UninitializedFieldError};
use ethers::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Parameters sent to `eth_callBundle`.
#[derive(Serialize, Clone, Default, Builder, Debug)]
#[builder(
    default,
    setter(strip_option),
    build_fn(error = "UninitializedFieldError")
)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleParams {
    /// Signed transactions, in execution order.
    pub txs: Vec<Bytes>,
    /// Block number the bundle would be included in.
    pub block_number: U64,
    /// Block whose state the simulation starts from.
    #[builder(default = "BlockNumber::Latest")]
    pub state_block_number: BlockNumber,
    /// Override for the simulated block timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Bundle simulation details.
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleResponse {
    pub bundle_hash: TxHash,
    /// Gas price the builder is paid per unit of gas, coinbase transfers included.
    #[serde_as(as = "DecimalU256")]
    pub bundle_gas_price: U256,
    #[serde_as(as = "DecimalU256")]
    pub coinbase_diff: U256,
    #[serde_as(as = "DecimalU256")]
    pub eth_sent_to_coinbase: U256,
    #[serde_as(as = "DecimalU256")]
    pub gas_fees: U256,
    pub results: Vec<CallBundleTxResult>,
    pub state_block_number: u64,
    pub total_gas_used: u64,
}

/// Outcome of a single bundle transaction within a simulation.
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleTxResult {
    pub tx_hash: TxHash,
    pub from_address: Address,
    #[serde(default)]
    pub to_address: Option<Address>,
    pub gas_used: u64,
    #[serde_as(as = "DecimalU256")]
    pub gas_price: U256,
    #[serde(default)]
    pub value: Option<Bytes>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub revert: Option<String>,
}

impl CallBundleTxResult {
    /// Why this transaction failed, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().or(self.revert.as_deref())
    }
}
