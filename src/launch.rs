//! Token launch as a single bundle: approve the router, add liquidity, fund the sniper wallets
//! and buy from each of them.

use crate::account::AccountIdentity;
use crate::actor::BundleActor;
use crate::bundle::BundleEntry;
use crate::helpers::provider::ChainClient;
use crate::wrapper::CallRequest;
use crate::{Error, Result};
use ethers::abi::{self, Token};
use ethers::prelude::*;
use ethers::utils::{id, parse_ether};
use serde::Deserialize;
use tracing::*;

/// Uniswap V2 router on mainnet.
pub const UNISWAP_V2_ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";

/// Seconds the router accepts the liquidity and swap calls for.
pub const DEADLINE_SECS: u64 = 20 * 60;

/// The JSON launch configuration. Amounts are ether strings such as `"0.5"`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    pub token_address: Address,
    pub weth_address: Address,
    #[serde(default = "default_router")]
    pub router_address: Address,
    pub desired_token_amount: String,
    pub amount_token_min: String,
    #[serde(rename = "amountETHMin")]
    pub amount_eth_min: String,
    pub liquidity_amount: String,
    #[serde(default = "default_approval_amount")]
    pub approval_amount: String,
    /// Minimum tokens each buy accepts.
    #[serde(default = "default_amount_out_min")]
    pub amount_out_min: String,
    /// Funded to every sniper on top of its buy amount, to pay for gas.
    #[serde(default = "default_sniper_gas_reserve")]
    pub sniper_gas_reserve: String,
    /// Private keys.
    pub sniper_wallets: Vec<String>,
    /// One per sniper wallet.
    pub desired_buy_amounts: Vec<String>,
}

fn default_router() -> Address {
    UNISWAP_V2_ROUTER.parse().unwrap_or_default()
}

fn default_approval_amount() -> String {
    "100000000".to_string()
}

fn default_amount_out_min() -> String {
    "0".to_string()
}

fn default_sniper_gas_reserve() -> String {
    "0.01".to_string()
}

impl LaunchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))
    }
}

/// A wallet buying right after liquidity is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniper {
    pub identity: AccountIdentity,
    pub buy_amount: U256,
}

/// A validated [`LaunchConfig`], amounts in wei.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub token: Address,
    pub weth: Address,
    pub router: Address,
    pub approval_amount: U256,
    pub desired_token_amount: U256,
    pub amount_token_min: U256,
    pub amount_eth_min: U256,
    pub liquidity_amount: U256,
    pub amount_out_min: U256,
    pub sniper_gas_reserve: U256,
    pub snipers: Vec<Sniper>,
}

fn ether(field: &str, amount: &str) -> Result<U256> {
    parse_ether(amount.trim()).map_err(|err| Error::Config(format!("{field}: {err}")))
}

impl LaunchPlan {
    pub fn from_config(config: &LaunchConfig) -> Result<Self> {
        if config.sniper_wallets.len() != config.desired_buy_amounts.len() {
            return Err(Error::Config(format!(
                "{} sniper wallets but {} buy amounts",
                config.sniper_wallets.len(),
                config.desired_buy_amounts.len()
            )));
        }

        let snipers = config
            .sniper_wallets
            .iter()
            .zip(&config.desired_buy_amounts)
            .enumerate()
            .map(|(i, (key, amount))| {
                Ok(Sniper {
                    identity: key
                        .parse()
                        .map_err(|_| Error::Config(format!("sniperWallets[{i}]: invalid private key")))?,
                    buy_amount: ether(&format!("desiredBuyAmounts[{i}]"), amount)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            token: config.token_address,
            weth: config.weth_address,
            router: config.router_address,
            approval_amount: ether("approvalAmount", &config.approval_amount)?,
            desired_token_amount: ether("desiredTokenAmount", &config.desired_token_amount)?,
            amount_token_min: ether("amountTokenMin", &config.amount_token_min)?,
            amount_eth_min: ether("amountETHMin", &config.amount_eth_min)?,
            liquidity_amount: ether("liquidityAmount", &config.liquidity_amount)?,
            amount_out_min: ether("amountOutMin", &config.amount_out_min)?,
            sniper_gas_reserve: ether("sniperGasReserve", &config.sniper_gas_reserve)?,
            snipers,
        })
    }

    /// Adds the whole launch to `actor`, in execution order. `now` is the current unix time.
    ///
    /// The executor approves and adds liquidity, the sponsor tops up every sniper that needs
    /// it and each sniper then buys.
    #[instrument(skip_all, fields(token = ?self.token, snipers = self.snipers.len()))]
    pub async fn populate<C: ChainClient>(&self, actor: &mut BundleActor<C>, now: u64) -> Result<usize> {
        let executor = actor.executor().clone();
        let sponsor = actor.sponsor().clone();
        let deadline = U256::from(now + DEADLINE_SECS);

        let mut entries = vec![
            BundleEntry::new(
                executor.clone(),
                CallRequest::call(self.token, approve(self.router, self.approval_amount)),
            ),
            BundleEntry::new(
                executor.clone(),
                CallRequest::call(
                    self.router,
                    add_liquidity_eth(
                        self.token,
                        self.desired_token_amount,
                        self.amount_token_min,
                        self.amount_eth_min,
                        executor.address(),
                        deadline,
                    ),
                )
                .with_value(self.liquidity_amount),
            ),
        ];

        for sniper in &self.snipers {
            let required = sniper.buy_amount + self.sniper_gas_reserve;
            if let Some(funding) =
                funding_call(actor.chain(), sniper.identity.address(), required).await?
            {
                entries.push(BundleEntry::new(sponsor.clone(), funding));
            }
        }

        let path = [self.weth, self.token];
        entries.extend(self.snipers.iter().map(|sniper| {
            BundleEntry::new(
                sniper.identity.clone(),
                CallRequest::call(
                    self.router,
                    swap_exact_eth_for_tokens(
                        self.amount_out_min,
                        &path,
                        sniper.identity.address(),
                        deadline,
                    ),
                )
                .with_value(sniper.buy_amount),
            )
        }));

        let count = entries.len();
        actor.add_entries(entries)?;
        info!(entries = count, "launch bundle populated");

        Ok(count)
    }
}

/// Transfer topping `recipient` up to `required` wei, or `None` when it already holds enough.
pub async fn funding_call<C: ChainClient>(
    chain: &C,
    recipient: Address,
    required: U256,
) -> Result<Option<CallRequest>> {
    let balance = chain.balance(recipient).await?;

    if balance >= required {
        debug!(?recipient, %balance, %required, "already funded");
        return Ok(None);
    }

    let shortfall = required - balance;
    debug!(?recipient, %balance, %shortfall, "funding");
    Ok(Some(CallRequest::transfer(recipient, shortfall)))
}

fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(abi::encode(args));
    data.into()
}

/// ERC-20 `approve(spender, amount)`.
pub fn approve(spender: Address, amount: U256) -> Bytes {
    encode_call(
        "approve(address,uint256)",
        &[Token::Address(spender), Token::Uint(amount)],
    )
}

/// Uniswap V2 router `addLiquidityETH`.
pub fn add_liquidity_eth(
    token: Address,
    amount_token_desired: U256,
    amount_token_min: U256,
    amount_eth_min: U256,
    to: Address,
    deadline: U256,
) -> Bytes {
    encode_call(
        "addLiquidityETH(address,uint256,uint256,uint256,address,uint256)",
        &[
            Token::Address(token),
            Token::Uint(amount_token_desired),
            Token::Uint(amount_token_min),
            Token::Uint(amount_eth_min),
            Token::Address(to),
            Token::Uint(deadline),
        ],
    )
}

/// Uniswap V2 router `swapExactETHForTokens`.
pub fn swap_exact_eth_for_tokens(
    amount_out_min: U256,
    path: &[Address],
    to: Address,
    deadline: U256,
) -> Bytes {
    encode_call(
        "swapExactETHForTokens(uint256,address[],address,uint256)",
        &[
            Token::Uint(amount_out_min),
            Token::Array(path.iter().map(|&address| Token::Address(address)).collect()),
            Token::Address(to),
            Token::Uint(deadline),
        ],
    )
}
