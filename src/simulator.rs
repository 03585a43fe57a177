use crate::api::types::{Buildable, CallBundleParams, CallBundleResponse};
use crate::bundle::SignedBundle;
use crate::client::BundleRelay;
use crate::error::RpcError;
use crate::Result;
use ethers::types::{U256, U64};
use tracing::*;

const NONCE_TOO_LOW: &str = "nonce too low";

/// What the relay made of a simulated bundle. Purely informational: nothing lands on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationResult {
    Success {
        /// Price per unit of gas the bundle pays the block builder.
        effective_gas_price: U256,
        /// Gas used by each transaction, in bundle order.
        per_tx_gas_used: Vec<u64>,
    },
    Failure {
        error_message: String,
    },
}

impl SimulationResult {
    /// Interprets a simulation report; any failing transaction fails the whole bundle.
    pub fn from_response(response: &CallBundleResponse) -> Self {
        let failed = response
            .results
            .iter()
            .enumerate()
            .find_map(|(index, tx)| tx.failure().map(|reason| (index, tx, reason)));

        match failed {
            Some((index, tx, reason)) => Self::Failure {
                error_message: format!("transaction {index} ({:?}) failed: {reason}", tx.tx_hash),
            },
            None => Self::Success {
                effective_gas_price: response.bundle_gas_price,
                per_tx_gas_used: response.results.iter().map(|tx| tx.gas_used).collect(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_message } => Some(error_message),
        }
    }

    /// Whether the relay saw a nonce already used, which usually means the bundle landed.
    pub fn is_nonce_too_low(&self) -> bool {
        self.error_message()
            .is_some_and(|message| message.to_lowercase().contains(NONCE_TOO_LOW))
    }
}

/// Simulates `bundle` as if included in block `target`, on top of the latest state.
///
/// Relay error payloads become [`SimulationResult::Failure`].
///
/// # Errors
///
/// Transport failures, which say nothing about the bundle.
#[instrument(skip_all, fields(target = %target))]
pub async fn simulate<R: BundleRelay>(
    relay: &R,
    bundle: &SignedBundle,
    target: U64,
) -> Result<SimulationResult> {
    let params = CallBundleParams::builder()
        .txs(bundle.raw_txs())
        .block_number(target)
        .build()?;

    let result = match relay.call_bundle(params).await {
        Ok(response) => SimulationResult::from_response(&response),
        Err(RpcError::Response(err)) => SimulationResult::Failure {
            error_message: err.message().to_string(),
        },
        Err(err) => return Err(err.into()),
    };

    match &result {
        SimulationResult::Success {
            effective_gas_price,
            per_tx_gas_used,
        } => debug!(%effective_gas_price, ?per_tx_gas_used, "simulation succeeded"),
        SimulationResult::Failure { error_message } => warn!(%error_message, "simulation failed"),
    }

    Ok(result)
}
