use crate::account::AccountIdentity;
use crate::api::networks::Network;
use crate::bundle::{Bundle, BundleAssembler, BundleEntry, SignedBundle};
use crate::client::{BundleRelay, RelayClient};
use crate::error::{AssemblyError, FieldError, RpcError, ValidationError};
use crate::fees::{gwei, FeeModel, FeeOracle, DEFAULT_PRIORITY_FEE_GWEI};
use crate::helpers::provider::{BlockSource, ChainClient, DEFAULT_REQUEST_TIMEOUT};
use crate::nonce::NonceTracker;
use crate::simulator::{simulate, SimulationResult};
use crate::submission::{
    into_rejection, resolve, submit, ExecutionReport, RunState, Step, SubmissionOutcome,
    Termination, DEFAULT_INTERVAL_TO_FUTURE_BLOCK,
};
use crate::wrapper::{CallRequest, TxWrapper};
use crate::Result;
use ethers::prelude::*;
use futures::future::join_all;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::*;
use typed_builder::TypedBuilder;

const NOT_PROVIDED: &str = "Not provided";

/// Furthest ahead of the chain head a bundle may be submitted for.
pub const MAX_INTERVAL_TO_FUTURE_BLOCK: u64 = 100;

/// Everything a [`BundleActor`] is made from, except the chain provider.
///
/// Fields are optional so that a single validation can report every missing one.
#[derive(TypedBuilder, Debug, Clone, Default)]
pub struct ActorConfig {
    #[builder(default, setter(strip_option))]
    pub chain_id: Option<u64>,
    /// Private key of the wallet funding the bundle.
    #[builder(default, setter(into, strip_option))]
    pub sponsor_key: Option<String>,
    /// Private key of the wallet signing the bundle transactions by default.
    #[builder(default, setter(into, strip_option))]
    pub executor_key: Option<String>,
    /// Defaults to [`DEFAULT_INTERVAL_TO_FUTURE_BLOCK`].
    #[builder(default, setter(strip_option))]
    pub interval_to_future_block: Option<u64>,
    /// In wei. Defaults to [`DEFAULT_PRIORITY_FEE_GWEI`] gwei.
    #[builder(default, setter(strip_option))]
    pub priority_fee: Option<U256>,
    #[builder(default, setter(strip_option))]
    pub fee_model: Option<FeeModel>,
    /// Relay endpoint. Defaults to the public relay of `chain_id`.
    #[builder(default, setter(into, strip_option))]
    pub relay_url: Option<String>,
    /// Upper bound for every node and relay request.
    #[builder(default, setter(strip_option))]
    pub request_timeout: Option<Duration>,
}

/// Requests the end of a running [`BundleActor::execute`]. Cheap to clone, safe to call twice.
#[derive(Debug, Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn stop(&self) {
        let first = self
            .sender
            .send_if_modified(|stopped| !std::mem::replace(stopped, true));

        if first {
            info!("stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Resolves once a stop has been requested.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return futures::future::pending().await;
        }
    }
}

/// Builds, signs and keeps submitting one bundle until it lands, fails or is stopped.
pub struct BundleActor<C> {
    chain_id: u64,
    chain: C,
    sponsor: AccountIdentity,
    executor: AccountIdentity,
    interval_to_future_block: u64,
    fee_oracle: FeeOracle,
    relay_network: Network,
    request_timeout: Duration,
    assembler: BundleAssembler,
    stop: StopHandle,
}

fn reject(fields: &mut Vec<FieldError>, field: &'static str, reason: impl Into<String>) {
    fields.push(FieldError {
        field,
        reason: reason.into(),
    });
}

fn parse_key(
    fields: &mut Vec<FieldError>,
    field: &'static str,
    key: Option<&str>,
) -> Option<AccountIdentity> {
    match key.map(str::trim).filter(|key| !key.is_empty()) {
        None => {
            reject(fields, field, NOT_PROVIDED);
            None
        }
        Some(key) => match key.parse() {
            Ok(identity) => Some(identity),
            Err(_) => {
                reject(fields, field, "Invalid private key");
                None
            }
        },
    }
}

impl<C: ChainClient> BundleActor<C> {
    /// Validates `config` and `chain` all at once.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] naming every missing or invalid field: `chain_id`, `provider`,
    /// `sponsor_key`, `executor_key`, `interval_to_future_block`, `relay_url`, `request_timeout`.
    pub fn new(config: ActorConfig, chain: Option<C>) -> std::result::Result<Self, ValidationError> {
        let mut fields = Vec::new();

        let chain_id = config.chain_id.filter(|id| *id != 0);
        if chain_id.is_none() {
            reject(&mut fields, "chain_id", NOT_PROVIDED);
        }
        if chain.is_none() {
            reject(&mut fields, "provider", NOT_PROVIDED);
        }
        let sponsor = parse_key(&mut fields, "sponsor_key", config.sponsor_key.as_deref());
        let executor = parse_key(&mut fields, "executor_key", config.executor_key.as_deref());

        let interval_to_future_block = config
            .interval_to_future_block
            .unwrap_or(DEFAULT_INTERVAL_TO_FUTURE_BLOCK);
        if !(1..=MAX_INTERVAL_TO_FUTURE_BLOCK).contains(&interval_to_future_block) {
            reject(
                &mut fields,
                "interval_to_future_block",
                format!("Must be between 1 and {MAX_INTERVAL_TO_FUTURE_BLOCK}"),
            );
        }

        let request_timeout = config.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            reject(&mut fields, "request_timeout", "Must be positive");
        }

        let relay_network = match (config.relay_url, chain_id) {
            (Some(url), Some(chain_id)) => match reqwest::Url::parse(&url) {
                Ok(_) => Some(Network::Custom { chain_id, url }),
                Err(err) => {
                    reject(&mut fields, "relay_url", format!("Invalid URL: {err}"));
                    None
                }
            },
            (None, Some(chain_id)) => {
                let network = Network::from_chain_id(chain_id);
                if network.is_none() {
                    reject(
                        &mut fields,
                        "relay_url",
                        format!("No public relay for chain {chain_id}"),
                    );
                }
                network
            }
            (_, None) => None,
        };

        match (chain_id, chain, sponsor, executor, relay_network) {
            (Some(chain_id), Some(chain), Some(sponsor), Some(executor), Some(relay_network))
                if fields.is_empty() =>
            {
                let fee_oracle = FeeOracle::new(
                    config.fee_model.unwrap_or_default(),
                    config
                        .priority_fee
                        .unwrap_or_else(|| gwei(DEFAULT_PRIORITY_FEE_GWEI)),
                );

                debug!(
                    chain_id,
                    sponsor = ?sponsor.address(),
                    executor = ?executor.address(),
                    interval_to_future_block,
                    "bundle actor ready"
                );

                Ok(Self {
                    chain_id,
                    chain,
                    sponsor,
                    executor,
                    interval_to_future_block,
                    fee_oracle,
                    relay_network,
                    request_timeout,
                    assembler: BundleAssembler::new(),
                    stop: StopHandle::new(),
                })
            }
            _ => Err(ValidationError { fields }),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn sponsor(&self) -> &AccountIdentity {
        &self.sponsor
    }

    pub fn executor(&self) -> &AccountIdentity {
        &self.executor
    }

    pub fn interval_to_future_block(&self) -> u64 {
        self.interval_to_future_block
    }

    pub fn fee_oracle(&self) -> &FeeOracle {
        &self.fee_oracle
    }

    pub fn relay_network(&self) -> &Network {
        &self.relay_network
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Entries added so far, in order.
    pub fn entries(&self) -> &BundleAssembler {
        &self.assembler
    }

    /// A relay client for this actor's relay, authenticated as `auth`.
    pub fn relay_client(&self, auth: &AccountIdentity) -> std::result::Result<RelayClient, RpcError> {
        RelayClient::new(auth, self.relay_network.clone(), self.request_timeout)
    }

    pub fn add_entry(
        &mut self,
        signer: AccountIdentity,
        call: CallRequest,
    ) -> std::result::Result<&mut Self, AssemblyError> {
        self.assembler.add_entry(signer, call)?;
        Ok(self)
    }

    pub fn add_entries(
        &mut self,
        entries: impl IntoIterator<Item = BundleEntry>,
    ) -> std::result::Result<&mut Self, AssemblyError> {
        self.assembler.add_entries(entries)?;
        Ok(self)
    }

    /// Adds a transaction signed by the executor.
    pub fn add_bundle_tx(&mut self, call: CallRequest) -> std::result::Result<&mut Self, AssemblyError> {
        let executor = self.executor.clone();
        self.add_entry(executor, call)
    }

    /// Adds transactions signed by the executor, in order.
    pub fn add_bundle_txs(
        &mut self,
        calls: impl IntoIterator<Item = CallRequest>,
    ) -> std::result::Result<&mut Self, AssemblyError> {
        let executor = self.executor.clone();
        self.add_entries(
            calls
                .into_iter()
                .map(|call| BundleEntry::new(executor.clone(), call)),
        )
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ends a running [`Self::execute`] at its next step. Later calls do nothing.
    pub fn stop(&self) {
        self.stop.stop()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Prices, numbers and signs the bundle.
    ///
    /// # Errors
    ///
    /// * [`AssemblyError::EmptyBundle`] if no entry was added.
    /// * Node failures while fetching fees or nonces.
    #[instrument(skip_all, fields(chain_id = self.chain_id))]
    pub async fn prepare(&self) -> Result<SignedBundle> {
        let bundle = self.assembler.finalize()?;

        let fees = self.fee_oracle.get_fees(&self.chain).await?;
        let mut nonces = NonceTracker::load(&self.chain, &bundle.signers()).await?;
        let gas_limits = self.gas_limits(&bundle).await;

        let wrapper = TxWrapper::new(self.chain_id, fees);

        let txs = bundle
            .entries()
            .iter()
            .zip(gas_limits)
            .map(|(entry, gas_limit)| {
                let from = entry.signer.address();
                let nonce = nonces.assign(from, entry.call.nonce)?;
                let call = entry
                    .call
                    .clone()
                    .with_nonce(nonce)
                    .with_gas_limit(gas_limit);

                Ok((entry.signer.clone(), wrapper.wrap(from, &call)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let signed = SignedBundle::sign(txs)?;
        info!(txs = signed.txs.len(), hashes = %signed, "bundle signed");

        Ok(signed)
    }

    /// Gas limit of every entry: its override, else an estimate, else its class default.
    /// Estimates run concurrently.
    async fn gas_limits(&self, bundle: &Bundle) -> Vec<U256> {
        join_all(bundle.entries().iter().map(|entry| async move {
            if let Some(gas_limit) = entry.call.gas_limit {
                return gas_limit;
            }

            let request = entry.call.estimate_request(entry.signer.address());
            match self.chain.estimate_gas(&request).await {
                Ok(gas_limit) => gas_limit,
                Err(err) => {
                    let fallback = entry.call.default_gas_limit();
                    warn!(%err, %fallback, to = ?entry.call.to, "gas estimate failed, using default");
                    fallback
                }
            }
        }))
        .await
    }

    /// Signs the bundle and simulates it once against the block after the latest one.
    pub async fn simulate_pending<R: BundleRelay>(&self, relay: &R) -> Result<SimulationResult> {
        let signed = self.prepare().await?;
        let head = self.chain.latest_block().await?;

        simulate(relay, &signed, head.number + 1).await
    }

    // Discards the result of a step finished after a stop request.
    fn discard_if_stopped(&self, state: &mut RunState) -> bool {
        if self.stop.is_stopped() {
            state.stop();
        }
        state.is_stopped()
    }
}

impl<C: ChainClient + BlockSource> BundleActor<C> {
    /// Signs the bundle, then on every new head simulates it and submits it for the block
    /// `interval_to_future_block` ahead, until it is included, fails or [`Self::stop`] is called.
    ///
    /// # Returns
    ///
    /// How the run ended, with the last target block and the number of blocks the bundle missed.
    ///
    /// # Errors
    ///
    /// Only failures before the first head is observed: an empty bundle, node failures while
    /// pricing or numbering it, a failed subscription. Later failures end the run with a
    /// [`Termination::Fatal`] report instead.
    #[instrument(skip_all, fields(chain_id = self.chain_id))]
    pub async fn execute<R: BundleRelay>(&self, relay: &R) -> Result<ExecutionReport> {
        let signed = self.prepare().await?;
        let auth = relay.auth_address();
        let mut state = RunState::new(self.interval_to_future_block);

        if self.discard_if_stopped(&mut state) {
            return Ok(state.report(auth));
        }

        let mut stop = self.stop.subscribe();
        let mut heads = self.chain.subscribe_heads().await?;
        info!(?auth, interval = self.interval_to_future_block, "waiting for new blocks");

        while !state.is_finished() {
            let head = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => {
                    state.stop();
                    break;
                }
                head = heads.next() => head,
            };

            let Some(head) = head else {
                state.fail("block subscription closed");
                break;
            };

            let mut step = state.on_block(head);
            loop {
                step = match step {
                    Step::Simulate { head, target } => {
                        debug!(%head, %target, "simulating");
                        let result = simulate(relay, &signed, target).await;
                        if self.discard_if_stopped(&mut state) {
                            break;
                        }
                        match result {
                            Ok(result) => state.after_simulation(target, &result),
                            Err(err) => state.fail(err),
                        }
                    }
                    Step::Submit { target } => {
                        let result = submit(relay, &signed, target).await;
                        if self.discard_if_stopped(&mut state) {
                            break;
                        }
                        match into_rejection(result) {
                            Ok(result) => state.after_submission(target, result),
                            Err(err) => state.fail(err),
                        }
                    }
                    Step::Resolve { target } => {
                        let outcome = resolve(&self.chain, &signed, target).await;
                        if self.discard_if_stopped(&mut state) {
                            break;
                        }
                        match outcome {
                            Ok(outcome) => {
                                match &outcome {
                                    SubmissionOutcome::Included(block) => {
                                        info!(%block, "bundle included")
                                    }
                                    SubmissionOutcome::NotIncluded(block) => info!(
                                        %block,
                                        fails = state.inclusion_fails() + 1,
                                        "block passed without bundle inclusion"
                                    ),
                                    SubmissionOutcome::NonceTooHigh => {
                                        warn!(%target, "nonce too high for this target")
                                    }
                                    SubmissionOutcome::Fatal(_) => {}
                                }
                                state.after_resolution(outcome)
                            }
                            Err(err) => state.fail(err),
                        }
                    }
                    Step::Wait | Step::Finish => break,
                };
            }
        }

        drop(heads);

        let report = state.report(auth);
        match &report.termination {
            Termination::Fatal { reason } => error!(
                %reason,
                target_block = ?report.target_block,
                fails = report.total_inclusion_fails,
                "bundle submission failed"
            ),
            termination => info!(
                ?termination,
                target_block = ?report.target_block,
                fails = report.total_inclusion_fails,
                "bundle submission finished"
            ),
        }

        Ok(report)
    }
}
