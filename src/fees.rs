use crate::helpers::provider::ChainClient;
use crate::{Error, Result};
use ethers::types::U256;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::*;

/// Priority fee used when none is configured, in gwei.
pub const DEFAULT_PRIORITY_FEE_GWEI: u64 = 31;

pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(9)
}

/// Which fee fields the bundle transactions carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeModel {
    /// Type-0 transactions paying `base fee + priority fee` as their gas price.
    #[default]
    Legacy,
    /// Type-2 transactions with a max fee and a max priority fee.
    Eip1559,
}

impl FromStr for FeeModel {
    type Err = Error;

    fn from_str(model: &str) -> Result<Self> {
        match model.trim().to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "eip1559" | "eip-1559" => Ok(Self::Eip1559),
            other => Err(Error::Config(format!("unknown fee model `{other}`"))),
        }
    }
}

/// Fee fields for a transaction. The two models are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fees {
    Legacy {
        gas_price: U256,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl Fees {
    /// Most a transaction may pay per unit of gas.
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            Self::Legacy { gas_price } => *gas_price,
            Self::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Derives bundle fees from the latest block, remembering the last base fee it saw.
#[derive(Debug)]
pub struct FeeOracle {
    model: FeeModel,
    priority_fee: U256,
    last_base_fee: Mutex<Option<U256>>,
}

impl FeeOracle {
    pub fn new(model: FeeModel, priority_fee: U256) -> Self {
        Self {
            model,
            priority_fee,
            last_base_fee: Mutex::new(None),
        }
    }

    pub fn model(&self) -> FeeModel {
        self.model
    }

    pub fn priority_fee(&self) -> U256 {
        self.priority_fee
    }

    /// Fees for the next bundle.
    ///
    /// Makes at most one request per fee input. If the latest block cannot be fetched the last
    /// known base fee is used instead; an EIP-1559 estimate failure falls back to
    /// `base fee + priority fee`.
    ///
    /// # Errors
    ///
    /// The node error, when the latest block cannot be fetched and no base fee was seen before.
    #[instrument(skip_all, fields(model = ?self.model))]
    pub async fn get_fees<C: ChainClient>(&self, chain: &C) -> Result<Fees> {
        let base_fee = self.base_fee(chain).await?;
        let floor = base_fee + self.priority_fee;

        let fees = match self.model {
            FeeModel::Legacy => Fees::Legacy { gas_price: floor },
            FeeModel::Eip1559 => {
                let max_fee_per_gas = match chain.estimate_eip1559_fees().await {
                    Ok((estimated_max_fee, _)) => estimated_max_fee.max(floor),
                    Err(err) => {
                        warn!(%err, "EIP-1559 fee estimate failed, using base fee + priority fee");
                        floor
                    }
                };

                Fees::Eip1559 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas: self.priority_fee,
                }
            }
        };

        debug!(?fees, %base_fee);
        Ok(fees)
    }

    async fn base_fee<C: ChainClient>(&self, chain: &C) -> Result<U256> {
        match chain.latest_block().await {
            Ok(head) => {
                let base_fee = head.base_fee_per_gas.unwrap_or_default();
                if let Ok(mut last) = self.last_base_fee.lock() {
                    *last = Some(base_fee);
                }
                Ok(base_fee)
            }
            Err(err) => {
                let last = self.last_base_fee.lock().ok().and_then(|last| *last);
                match last {
                    Some(base_fee) => {
                        warn!(%err, %base_fee, "latest block unavailable, using last known base fee");
                        Ok(base_fee)
                    }
                    None => Err(err),
                }
            }
        }
    }
}

impl Default for FeeOracle {
    fn default() -> Self {
        Self::new(FeeModel::default(), gwei(DEFAULT_PRIORITY_FEE_GWEI))
    }
}
