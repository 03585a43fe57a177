use crate::account::AccountIdentity;
use crate::api::networks::{Network, RelayNetwork};
use crate::api::rpc_client::{RelayRequest, RelayRpcClient};
use crate::api::types::*;
use crate::error::RpcError;
use ethers::prelude::*;
use std::time::Duration;
use tracing::*;

type Result<T> = std::result::Result<T, RpcError>;

/// The bundle endpoints of a relay.
///
/// Implemented by [`RelayClient`]; tests provide their own.
#[allow(async_fn_in_trait)]
pub trait BundleRelay {
    /// Address the relay identifies this searcher by.
    fn auth_address(&self) -> Address;

    /// Simulates a bundle against the given block (`eth_callBundle`).
    async fn call_bundle(&self, params: CallBundleParams) -> Result<CallBundleResponse>;

    /// Submits a bundle for inclusion in exactly one block (`eth_sendBundle`).
    async fn send_bundle(&self, params: SendBundleParams) -> Result<SendBundleResponse>;
}

/// Client of a Flashbots-style relay, authenticated with a searcher identity.
pub struct RelayClient {
    rpc: RelayRpcClient,
    network: RelayNetwork,
}

impl RelayClient {
    /// # Arguments
    ///
    /// * `auth` - Identity signing every request. It holds no funds and needs none.
    /// * `network` - Relay to talk to.
    /// * `timeout` - Upper bound for each relay request.
    pub fn new(auth: &AccountIdentity, network: Network, timeout: Duration) -> Result<Self> {
        let network: RelayNetwork = network.into();

        debug!(url = %network.api_url, auth = ?auth.address(), "relay client");

        Ok(Self {
            rpc: RelayRpcClient::new(network.api_url.clone(), auth.wallet().clone(), timeout)?,
            network,
        })
    }

    pub fn network(&self) -> &RelayNetwork {
        &self.network
    }
}

impl BundleRelay for RelayClient {
    fn auth_address(&self) -> Address {
        self.rpc.auth_wallet().address()
    }

    /// Simulates a bundle.
    ///
    /// # Returns
    ///
    /// Simulation details, per-transaction failures included. The relay answers with an error
    /// payload ([`RpcError::Response`]) when the bundle cannot be simulated at all.
    async fn call_bundle(&self, params: CallBundleParams) -> Result<CallBundleResponse> {
        self.rpc.post(RelayRequest::CallBundle, [params]).await
    }

    /// Sends a bundle.
    ///
    /// # Returns
    ///
    /// The bundle hash. Acceptance says nothing about inclusion.
    async fn send_bundle(&self, params: SendBundleParams) -> Result<SendBundleResponse> {
        self.rpc.post(RelayRequest::SendBundle, [params]).await
    }
}
