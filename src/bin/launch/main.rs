//! Launches a token in one bundle: approve, add liquidity, fund the snipers and buy.
//!
//! Exits with `0` once the bundle is included, already landed or the run is interrupted, and
//! with `1` on any error.

use ethers::prelude::*;
use launch_bundle::prelude::*;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::*;

mod config;
mod logging;

use config::Config;
use logging::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> eyre::Result<ExecutionReport> {
    let config = Config::from_env()?;
    let plan = LaunchPlan::from_config(&config.launch)?;

    let provider = Provider::<Ws>::connect(&config.provider_url).await?;
    let chain = TimedNode::new(provider).with_timeout(config.request_timeout);
    let mut actor = BundleActor::new(config.actor, Some(chain))?;

    let auth = match config.auth_key {
        Some(key) => key.parse::<AccountIdentity>()?,
        None => {
            let auth = AccountIdentity::random();
            warn!(
                key = auth.private_key_hex(),
                "no FLASHBOTS_AUTH_KEY, generated one: please keep it"
            );
            auth
        }
    };
    let relay = actor.relay_client(&auth)?;

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    plan.populate(&mut actor, now).await?;

    let stop = actor.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted");
            stop.stop();
        }
    });

    let report = actor.execute(&relay).await?;

    info!(
        termination = ?report.termination,
        block = ?report.target_block,
        total_inclusion_fails = report.total_inclusion_fails,
        auth = ?report.auth_signer,
        "done"
    );

    Ok(report)
}
