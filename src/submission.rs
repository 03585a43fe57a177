use crate::api::types::{Buildable, SendBundleParams};
use crate::bundle::SignedBundle;
use crate::client::BundleRelay;
use crate::error::{RpcError, SubmissionError};
use crate::helpers::provider::ChainClient;
use crate::simulator::SimulationResult;
use crate::{Error, Result};
use ethers::prelude::*;
use futures::future::try_join_all;
use std::collections::{BTreeSet, VecDeque};
use tracing::*;

/// Blocks between the observed head and the block a bundle is submitted for.
pub const DEFAULT_INTERVAL_TO_FUTURE_BLOCK: u64 = 2;

/// Where the submission loop is within one block cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Simulating,
    Submitting,
    AwaitingResolution,
    Retrying,
    Included,
    Fatal,
    Stopped,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Included | Self::Fatal | Self::Stopped)
    }
}

/// What the loop has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Simulate the bundle as if included in `target`.
    Simulate { head: U64, target: U64 },
    /// Submit the bundle for `target`.
    Submit { target: U64 },
    /// Find out whether the bundle made it into `target`.
    Resolve { target: U64 },
    /// Nothing to do until the next head.
    Wait,
    /// The loop is over.
    Finish,
}

/// How a submitted bundle fared once its target block passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Included(U64),
    NotIncluded(U64),
    /// A signer's nonce moved past the bundle; it cannot land until that changes.
    NonceTooHigh,
    Fatal(String),
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Included,
    /// The relay reported a nonce already used, most likely by an earlier attempt that landed.
    AlreadyLanded { message: String },
    Stopped,
    Fatal { reason: String },
}

/// Final report of a run, whatever ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub termination: Termination,
    /// Block targeted by the last submission.
    pub target_block: Option<U64>,
    pub total_inclusion_fails: u64,
    /// Identity the relay knows the submissions by.
    pub auth_signer: Address,
}

impl ExecutionReport {
    /// Everything but a fatal error counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self.termination, Termination::Fatal { .. })
    }
}

/// State of one run of the submission loop.
///
/// Every new head gets its own submission, for `head + interval`. Submissions overlap: each
/// outstanding target is resolved once the chain reaches it, before the next head is simulated.
///
/// Every transition is a plain function of the current state and what just happened, so the
/// loop can be driven without a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    interval: u64,
    phase: Phase,
    target_block: Option<U64>,
    inclusion_fails: u64,
    last_processed: Option<U64>,
    outstanding: BTreeSet<U64>,
    due: VecDeque<U64>,
    unsimulated_head: Option<U64>,
    stopped: bool,
    termination: Option<Termination>,
}

impl RunState {
    pub fn new(interval_to_future_block: u64) -> Self {
        Self {
            interval: interval_to_future_block,
            phase: Phase::Idle,
            target_block: None,
            inclusion_fails: 0,
            last_processed: None,
            outstanding: BTreeSet::new(),
            due: VecDeque::new(),
            unsimulated_head: None,
            stopped: false,
            termination: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target_block(&self) -> Option<U64> {
        self.target_block
    }

    pub fn inclusion_fails(&self) -> u64 {
        self.inclusion_fails
    }

    /// Submitted targets the chain has not reached yet, lowest first.
    pub fn outstanding(&self) -> impl Iterator<Item = U64> + '_ {
        self.outstanding.iter().copied()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// A new chain head was observed.
    ///
    /// Resolves every outstanding target the head reached, then simulates for the head.
    /// Heads not above the last processed one are ignored, as is everything once stopped.
    pub fn on_block(&mut self, head: U64) -> Step {
        if self.stopped || self.is_finished() {
            return Step::Finish;
        }
        if self.last_processed.is_some_and(|last| head <= last) {
            trace!(%head, "stale head");
            return Step::Wait;
        }

        self.last_processed = Some(head);
        self.due.extend(self.outstanding.range(..=head).copied());
        self.outstanding.retain(|target| *target > head);
        self.unsimulated_head = Some(head);

        self.next_step()
    }

    /// The simulation for `target` came back.
    pub fn after_simulation(&mut self, target: U64, result: &SimulationResult) -> Step {
        if self.stopped {
            return Step::Finish;
        }

        match result {
            SimulationResult::Success { .. } => {
                self.phase = Phase::Submitting;
                self.target_block = Some(target);
                Step::Submit { target }
            }
            SimulationResult::Failure { error_message } if result.is_nonce_too_low() => {
                self.finish(Termination::AlreadyLanded {
                    message: error_message.clone(),
                })
            }
            SimulationResult::Failure { error_message } => self.fail(error_message),
        }
    }

    /// The relay answered the submission for `target`.
    pub fn after_submission(
        &mut self,
        target: U64,
        result: std::result::Result<TxHash, SubmissionError>,
    ) -> Step {
        if self.stopped {
            return Step::Finish;
        }

        match result {
            Ok(_) => {
                self.outstanding.insert(target);
                self.phase = Phase::AwaitingResolution;
                Step::Wait
            }
            Err(SubmissionError::NonceTooLow(message)) => {
                self.finish(Termination::AlreadyLanded { message })
            }
            Err(SubmissionError::NonceTooHigh(_)) => {
                self.phase = Phase::Retrying;
                Step::Wait
            }
            Err(err @ SubmissionError::Other(_)) => self.fail(err),
        }
    }

    /// A target block passed and the fate of its submission is known.
    pub fn after_resolution(&mut self, outcome: SubmissionOutcome) -> Step {
        if self.stopped {
            return Step::Finish;
        }

        match outcome {
            SubmissionOutcome::Included(block) => {
                self.target_block = Some(block);
                return self.finish(Termination::Included);
            }
            SubmissionOutcome::NotIncluded(_) => {
                self.inclusion_fails += 1;
                self.phase = Phase::Retrying;
            }
            SubmissionOutcome::NonceTooHigh => self.phase = Phase::Retrying,
            SubmissionOutcome::Fatal(reason) => return self.fail(reason),
        }

        self.next_step()
    }

    // Due resolutions first, then the simulation for the latest head.
    fn next_step(&mut self) -> Step {
        if let Some(target) = self.due.pop_front() {
            self.phase = Phase::AwaitingResolution;
            return Step::Resolve { target };
        }

        let Some(head) = self.unsimulated_head.take() else {
            return Step::Wait;
        };
        match head.checked_add(U64::from(self.interval)) {
            Some(target) => {
                self.phase = Phase::Simulating;
                Step::Simulate { head, target }
            }
            None => self.fail(format!("no block {} after {head}", self.interval)),
        }
    }

    /// Ends the run with an error.
    pub fn fail(&mut self, reason: impl ToString) -> Step {
        self.finish(Termination::Fatal {
            reason: reason.to_string(),
        })
    }

    /// Requests the end of the run. Only the first call has an effect.
    pub fn stop(&mut self) {
        if self.stopped || self.is_finished() {
            return;
        }
        self.stopped = true;
        self.phase = Phase::Stopped;
        self.termination = Some(Termination::Stopped);
    }

    fn finish(&mut self, termination: Termination) -> Step {
        self.phase = match termination {
            Termination::Included => Phase::Included,
            Termination::Fatal { .. } => Phase::Fatal,
            Termination::AlreadyLanded { .. } | Termination::Stopped => Phase::Stopped,
        };
        self.termination = Some(termination);
        Step::Finish
    }

    /// Final report. A run that never terminated reports as stopped.
    pub fn report(&self, auth_signer: Address) -> ExecutionReport {
        ExecutionReport {
            termination: self.termination.clone().unwrap_or(Termination::Stopped),
            target_block: self.target_block,
            total_inclusion_fails: self.inclusion_fails,
            auth_signer,
        }
    }
}

/// Submits `bundle` for block `target`.
///
/// # Errors
///
/// * [`Error::Submission`] if the relay rejected the bundle.
/// * Transport failures otherwise.
#[instrument(skip_all, fields(target = %target))]
pub async fn submit<R: BundleRelay>(relay: &R, bundle: &SignedBundle, target: U64) -> Result<TxHash> {
    let params = SendBundleParams::builder()
        .txs(bundle.raw_txs())
        .block_number(target)
        .build()?;

    match relay.send_bundle(params).await {
        Ok(response) => {
            info!(bundle_hash = ?response.bundle_hash, "bundle submitted");
            Ok(response.bundle_hash)
        }
        Err(RpcError::Response(err)) => {
            let err = SubmissionError::classify(err.message());
            warn!(%err, "bundle rejected");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Works out what became of `bundle` once the chain reached `target`.
#[instrument(skip_all, fields(target = %target))]
pub async fn resolve<C: ChainClient>(
    chain: &C,
    bundle: &SignedBundle,
    target: U64,
) -> Result<SubmissionOutcome> {
    let receipts = try_join_all(bundle.hashes().map(|hash| chain.receipt(hash))).await?;
    let in_target = receipts
        .iter()
        .filter(|receipt| {
            receipt
                .as_ref()
                .is_some_and(|receipt| receipt.block_number == Some(target))
        })
        .count();

    if in_target == receipts.len() {
        return Ok(SubmissionOutcome::Included(target));
    }
    if in_target > 0 {
        return Ok(SubmissionOutcome::Fatal(format!(
            "only {in_target} of {} bundle transactions landed in block {target}",
            receipts.len()
        )));
    }

    for tx in bundle.first_per_signer() {
        let on_chain = chain.nonce_at(tx.signer, target).await?;
        if on_chain > tx.nonce {
            debug!(signer = ?tx.signer, %on_chain, bundle = %tx.nonce, "nonce moved past the bundle");
            return Ok(SubmissionOutcome::NonceTooHigh);
        }
    }

    Ok(SubmissionOutcome::NotIncluded(target))
}

/// Sorts a failed submission into what the loop reacts to and what ends it.
pub(crate) fn into_rejection(
    result: Result<TxHash>,
) -> std::result::Result<std::result::Result<TxHash, SubmissionError>, Error> {
    match result {
        Ok(hash) => Ok(Ok(hash)),
        Err(Error::Submission(err)) => Ok(Err(err)),
        Err(err) => Err(err),
    }
}
