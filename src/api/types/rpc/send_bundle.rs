use derive_builder::{Builder, UninitializedFieldError};
use ethers::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters sent to `eth_sendBundle`.
#[derive(Clone, Serialize, Default, Builder, Debug, PartialEq, Eq)]
#[builder(
    default,
    setter(strip_option),
    build_fn(error = "UninitializedFieldError")
)]
#[serde(rename_all = "camelCase")]
pub struct SendBundleParams {
    /// Signed transactions, in execution order.
    pub txs: Vec<Bytes>,
    /// The one block the bundle is valid for.
    pub block_number: U64,
    /// Minimum timestamp for which this bundle is valid, in seconds since the unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_timestamp: Option<u64>,
    /// Maximum timestamp for which this bundle is valid, in seconds since the unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timestamp: Option<u64>,
    /// Transactions allowed to revert without voiding the bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverting_tx_hashes: Option<Vec<TxHash>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendBundleResponse {
    pub bundle_hash: TxHash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Buildable;

    #[test]
    fn serializes_only_populated_fields() {
        let params = SendBundleParams::builder()
            .txs(vec![Bytes::from(vec![0x02, 0xf8])])
            .block_number(U64::from(102))
            .build()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({ "txs": ["0x02f8"], "blockNumber": "0x66" })
        );
    }
}
