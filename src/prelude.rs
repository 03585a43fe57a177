pub use crate::account::AccountIdentity;
pub use crate::actor::{ActorConfig, BundleActor, StopHandle, MAX_INTERVAL_TO_FUTURE_BLOCK};
pub use crate::api::networks::{Network, RelayNetwork};
pub use crate::api::types::{
    Buildable, CallBundleParams, CallBundleResponse, CallBundleTxResult, SendBundleParams,
    SendBundleResponse,
};
pub use crate::bundle::{Bundle, BundleAssembler, BundleEntry, SignedBundle, SignedTx};
pub use crate::client::{BundleRelay, RelayClient};
pub use crate::fees::{gwei, FeeModel, FeeOracle, Fees, DEFAULT_PRIORITY_FEE_GWEI};
pub use crate::helpers::provider::{
    BlockHead, BlockSource, BlockStream, ChainClient, TimedNode, DEFAULT_REQUEST_TIMEOUT,
};
pub use crate::launch::{
    add_liquidity_eth, approve, funding_call, swap_exact_eth_for_tokens, LaunchConfig, LaunchPlan,
    Sniper, DEADLINE_SECS, UNISWAP_V2_ROUTER,
};
pub use crate::nonce::NonceTracker;
pub use crate::simulator::{simulate, SimulationResult};
pub use crate::submission::{
    resolve, submit, ExecutionReport, Phase, RunState, Step, SubmissionOutcome, Termination,
    DEFAULT_INTERVAL_TO_FUTURE_BLOCK,
};
pub use crate::wrapper::{
    CallRequest, CallRequestBuilder, TxWrapper, CONTRACT_CALL_GAS_LIMIT, TRANSFER_GAS_LIMIT,
};
