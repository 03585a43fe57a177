use crate::api::types::Buildable;
use crate::error::AssemblyError;
use crate::fees::Fees;
use derive_builder::{Builder, UninitializedFieldError};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;

/// Gas limit of a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Gas limit assumed for a contract call nobody estimated.
pub const CONTRACT_CALL_GAS_LIMIT: u64 = 1_000_000;

/// A call as produced by a contract codec: everything a transaction needs except pricing,
/// chain id and, usually, nonce and gas limit.
#[derive(Clone, Default, Builder, Debug, PartialEq, Eq)]
#[builder(
    default,
    setter(strip_option, into),
    build_fn(error = "UninitializedFieldError")
)]
pub struct CallRequest {
    /// Expected sender. When set it has to match the entry signer.
    pub from: Option<Address>,
    /// Destination; `None` deploys `data` as a contract.
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    /// Explicit nonce, otherwise assigned from the signer's pending nonce.
    pub nonce: Option<U256>,
    /// Explicit gas limit, otherwise estimated.
    pub gas_limit: Option<U256>,
}

impl Buildable for CallRequest {
    type Builder = CallRequestBuilder;

    fn builder() -> Self::Builder {
        CallRequestBuilder::default()
    }
}

impl CallRequest {
    /// Plain transfer of `value` wei to `to`.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value: Some(value),
            ..Default::default()
        }
    }

    /// Contract call of `data` on `to`.
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    fn has_data(&self) -> bool {
        self.data.as_ref().is_some_and(|data| !data.is_empty())
    }

    /// Whether this is a plain value transfer.
    pub fn is_transfer(&self) -> bool {
        self.to.is_some() && !self.has_data()
    }

    /// Gas limit used when neither an override nor an estimate is available.
    pub fn default_gas_limit(&self) -> U256 {
        if self.is_transfer() {
            U256::from(TRANSFER_GAS_LIMIT)
        } else {
            U256::from(CONTRACT_CALL_GAS_LIMIT)
        }
    }

    /// Unpriced request for `eth_estimateGas`, sent from `from`.
    pub fn estimate_request(&self, from: Address) -> TypedTransaction {
        let mut tx = TransactionRequest::new().from(from);
        tx.to = self.to.map(Into::into);
        tx.value = self.value;
        tx.data = self.data.clone();
        tx.into()
    }
}

/// Turns [`CallRequest`]s into chain-submittable transactions for one chain and fee level.
#[derive(Debug, Clone, Copy)]
pub struct TxWrapper {
    chain_id: u64,
    fees: Fees,
}

impl TxWrapper {
    pub fn new(chain_id: u64, fees: Fees) -> Self {
        Self { chain_id, fees }
    }

    /// Fills chain id, fee fields and gas limit, keeping the call's nonce if it has one.
    ///
    /// # Errors
    ///
    /// * [`AssemblyError::InvalidCall`] if the call has neither destination nor data.
    pub fn wrap(
        &self,
        from: Address,
        call: &CallRequest,
    ) -> Result<TypedTransaction, AssemblyError> {
        if call.to.is_none() && !call.has_data() {
            return Err(AssemblyError::InvalidCall);
        }

        let gas = call.gas_limit.unwrap_or_else(|| call.default_gas_limit());

        let mut tx: TypedTransaction = match self.fees {
            Fees::Legacy { gas_price } => TransactionRequest::new()
                .from(from)
                .chain_id(self.chain_id)
                .gas(gas)
                .gas_price(gas_price)
                .into(),
            Fees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Eip1559TransactionRequest::new()
                .from(from)
                .chain_id(self.chain_id)
                .gas(gas)
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas)
                .into(),
        };

        if let Some(to) = call.to {
            tx.set_to(to);
        }
        if let Some(value) = call.value {
            tx.set_value(value);
        }
        if let Some(data) = &call.data {
            tx.set_data(data.clone());
        }
        if let Some(nonce) = call.nonce {
            tx.set_nonce(nonce);
        }

        Ok(tx)
    }
}
