use dotenv::dotenv;
use envconfig::Envconfig;
use eyre::{Result, WrapErr};
use launch_bundle::prelude::*;
use std::time::Duration;
use tracing::*;

pub struct Config {
    pub provider_url: String,
    pub actor: ActorConfig,
    /// Relay auth key. A random one is generated when absent.
    pub auth_key: Option<String>,
    pub launch: LaunchConfig,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads the environment (and `.env`, if any) and the JSON launch configuration.
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        let config = ConfigRaw::init_from_env()?;

        let launch = std::fs::read_to_string(&config.launch_config)
            .wrap_err_with(|| format!("Failed to read {}", config.launch_config))?;
        let launch = LaunchConfig::from_json(&launch)?;

        let request_timeout = Duration::from_secs(config.request_timeout_secs);

        info!(
            provider = config.provider_url,
            chain_id = config.chain_id,
            relay = ?config.relay_url,
            launch_config = config.launch_config,
            "config"
        );

        Ok(Config {
            actor: ActorConfig {
                chain_id: Some(config.chain_id),
                sponsor_key: config.funding_wallet_private_key,
                executor_key: config.deployer_private_key,
                interval_to_future_block: config.blocks_in_future,
                priority_fee: config.priority_fee_gwei.map(gwei),
                fee_model: config.fee_model,
                relay_url: config.relay_url,
                request_timeout: Some(request_timeout),
            },
            provider_url: config.provider_url,
            auth_key: config.flashbots_auth_key,
            launch,
            request_timeout,
        })
    }
}

#[derive(Envconfig)]
pub struct ConfigRaw {
    #[envconfig(from = "PROVIDER_URL")]
    pub provider_url: String,
    #[envconfig(from = "CHAIN_ID", default = "1")]
    pub chain_id: u64,
    #[envconfig(from = "FUNDING_WALLET_PRIVATE_KEY")]
    pub funding_wallet_private_key: Option<String>,
    #[envconfig(from = "DEPLOYER_PRIVATE_KEY")]
    pub deployer_private_key: Option<String>,
    #[envconfig(from = "FLASHBOTS_AUTH_KEY")]
    pub flashbots_auth_key: Option<String>,
    #[envconfig(from = "RELAY_URL")]
    pub relay_url: Option<String>,
    #[envconfig(from = "BLOCKS_IN_FUTURE")]
    pub blocks_in_future: Option<u64>,
    #[envconfig(from = "PRIORITY_FEE_GWEI")]
    pub priority_fee_gwei: Option<u64>,
    #[envconfig(from = "FEE_MODEL")]
    pub fee_model: Option<FeeModel>,
    #[envconfig(from = "REQUEST_TIMEOUT_SECS", default = "10")]
    pub request_timeout_secs: u64,
    #[envconfig(from = "LAUNCH_CONFIG", default = "lib/config.json")]
    pub launch_config: String,
}
