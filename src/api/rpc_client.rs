use crate::api::types::{JsonRpcRequest, JsonRpcResponse};
use crate::error::RpcError;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::keccak256;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::*;

type Result<T> = std::result::Result<T, RpcError>;

/// JSON-RPC methods understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRequest {
    CallBundle,
    SendBundle,
}

impl RelayRequest {
    pub fn as_method_name(&self) -> &'static str {
        match &self {
            Self::CallBundle => "eth_callBundle",
            Self::SendBundle => "eth_sendBundle",
        }
    }
}

pub struct RelayRpcClient {
    base_url: String,
    request_id: AtomicI32,
    http: reqwest::Client,
    auth_wallet: LocalWallet,
}

impl RelayRpcClient {
    pub fn new(base_url: String, auth_wallet: LocalWallet, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url,
            request_id: Self::new_request_id(),
            http: reqwest::Client::builder().timeout(timeout).build()?,
            auth_wallet,
        })
    }

    pub fn auth_wallet(&self) -> &LocalWallet {
        &self.auth_wallet
    }

    /// Sends a signed POST request to the relay and returns the data.
    ///
    /// # Arguments
    ///
    /// * `method` - JSON-RPC method
    /// * `params` - JSON-RPC params
    ///
    /// # Errors
    ///
    /// * [`RpcError::Response`] if the relay answers with an error payload.
    /// * [`RpcError::Network`] if the request fails or times out.
    pub async fn post<T, P>(&self, method: RelayRequest, params: P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method: method.as_method_name(),
            params: serde_json::to_value(params)?,
        };
        let body_text = serde_json::to_string(&body)?;

        trace!(request = %body_text);

        let signature = format!(
            "{:?}:0x{}",
            self.auth_wallet.address(),
            self.auth_wallet
                .sign_message(format!(
                    "0x{}",
                    ethers::utils::hex::encode(keccak256(body_text.as_bytes()))
                ))
                .await?
        );

        trace!(?signature);

        let headers = {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert("X-Flashbots-Signature", HeaderValue::from_str(&signature)?);
            headers
        };

        let response: String = self
            .http
            .post(&self.base_url)
            .headers(headers)
            .body(body_text)
            .send()
            .await?
            .text()
            .await?;

        trace!(%response);

        let response = serde_json::from_str::<JsonRpcResponse<T>>(&response).map_err(|source| {
            RpcError::Deserialization {
                source,
                text: response,
            }
        })?;

        match response {
            JsonRpcResponse::Error(err) => Err(RpcError::Response(err)),
            JsonRpcResponse::Success(data) => Ok(data.result),
        }
    }

    // Pseudo-random start so that two clients signing with the same key don't reuse ids.
    fn new_request_id() -> AtomicI32 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();

        AtomicI32::new((nanos % 1_000_000) as i32)
    }
}
