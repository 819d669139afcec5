//! Gasless initiation and relayed redeems.
//!
//! The user signs an EIP-712 `Initiate` for the source HTLC and the relayer
//! broadcasts it. The HTLC pulls the tokens, so the first swap from a wallet
//! needs an on-chain approval.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::assets::{Chain, ChainFamily};
use crate::auth::Authenticator;
use crate::crypto::OrderSecret;
use crate::orders::{parse_amount, MatchedOrder};
use crate::rpc::{ApiClient, RetryConfig};
use crate::types::{ChainActionError, Result, SwapError};

sol! {
    struct Initiate {
        address redeemer;
        uint256 timelock;
        uint256 amount;
        bytes32 secretHash;
    }
}

/// EVM capabilities the relay flow needs from the user's wallet.
#[async_trait]
pub trait EvmInitiator: Send + Sync {
    fn address(&self) -> String;

    async fn chain_id(&self) -> Result<u64>;

    /// ERC20 escrowed by the HTLC contract.
    async fn htlc_token(&self, htlc: Address) -> Result<Address>;

    async fn token_balance(&self, token: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256>;

    /// Broadcasts an approval and waits for it to be mined.
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<String>;

    async fn sign_digest(&self, digest: B256) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformOn {
    Source,
    Destination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub order_id: String,
    pub signature: String,
    pub perform_on: PerformOn,
}

#[derive(Serialize)]
struct RedeemRequest<'a> {
    order_id: &'a str,
    secret: String,
    perform_on: PerformOn,
}

/// EIP-712 signing hash of the source leg's `Initiate`.
pub fn initiate_digest(order: &MatchedOrder, chain_id: u64) -> Result<B256> {
    let leg = &order.source_swap;
    let htlc = parse_address("HTLC", &leg.asset)?;
    let initiate = Initiate {
        redeemer: parse_address("redeemer", &leg.redeemer)?,
        timelock: U256::from(leg.timelock),
        amount: parse_amount(&leg.amount)?,
        secretHash: B256::from_str(leg.secret_hash.trim()).map_err(|err| {
            SwapError::Validation(format!("invalid secret hash {}: {err}", leg.secret_hash))
        })?,
    };
    let domain = Eip712Domain::new(
        Some("HTLC".into()),
        Some("1".into()),
        Some(U256::from(chain_id)),
        Some(htlc),
        None,
    );
    Ok(initiate.eip712_signing_hash(&domain))
}

fn parse_address(label: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|err| SwapError::Validation(format!("invalid {label} address {value}: {err}")))
}

pub struct RelayClient {
    api: ApiClient,
    auth: Arc<dyn Authenticator>,
    approved: Mutex<HashSet<(Address, Address)>>,
}

impl RelayClient {
    pub fn new(orderbook_url: &str, auth: Arc<dyn Authenticator>, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("relayer", orderbook_url, retry)?,
            auth,
            approved: Mutex::new(HashSet::new()),
        })
    }

    /// Ensures the allowance and signs the initiate payload.
    pub async fn prepare_initiate(
        &self,
        order: &MatchedOrder,
        initiator: &dyn EvmInitiator,
    ) -> Result<InitiateRequest> {
        let chain = Chain::from_str(&order.source_swap.chain)?;
        if chain.family() != ChainFamily::Evm {
            return Err(SwapError::Validation(format!(
                "relayed initiation needs an EVM source chain, got {chain}"
            )));
        }
        let chain_id = initiator.chain_id().await?;
        if let Some(expected) = chain.evm_chain_id() {
            if expected != chain_id {
                return Err(SwapError::Configuration(format!(
                    "wallet is on chain id {chain_id} but the order's source chain {chain} is {expected}"
                )));
            }
        }

        let htlc = parse_address("HTLC", &order.source_swap.asset)?;
        let amount = parse_amount(&order.source_swap.amount)?;
        self.ensure_allowance(initiator, htlc, amount).await?;

        let digest = initiate_digest(order, chain_id)?;
        let signature = initiator.sign_digest(digest).await?;
        Ok(InitiateRequest {
            order_id: order.id().to_string(),
            signature: format!("0x{}", hex::encode(signature)),
            perform_on: PerformOn::Source,
        })
    }

    /// Gasless initiation of the source leg; returns the relayer's tx hash.
    pub async fn init(&self, order: &MatchedOrder, initiator: &dyn EvmInitiator) -> Result<String> {
        let request = self.prepare_initiate(order, initiator).await?;
        let token = self.auth.token().await?;
        let tx_hash: String = self
            .api
            .post("relayer/initiate", &request, Some(&token))
            .await?;
        info!(order_id = %request.order_id, %tx_hash, "Initiate relayed");
        Ok(tx_hash)
    }

    /// Hands the secret to the relayer, which redeems the destination leg.
    pub async fn redeem(&self, order_id: &str, secret: &OrderSecret) -> Result<String> {
        let token = self.auth.token().await?;
        let request = RedeemRequest {
            order_id,
            secret: format!("0x{}", secret.secret_hex()),
            perform_on: PerformOn::Destination,
        };
        let tx_hash: String = self
            .api
            .post("relayer/redeem", &request, Some(&token))
            .await
            .map_err(|err| match err {
                SwapError::Validation(message) => ChainActionError::classify(message).into(),
                other => other,
            })?;
        info!(order_id, %tx_hash, "Redeem relayed");
        Ok(tx_hash)
    }

    async fn ensure_allowance(
        &self,
        initiator: &dyn EvmInitiator,
        htlc: Address,
        amount: U256,
    ) -> Result<()> {
        let mut approved = self.approved.lock().await;
        let token = initiator.htlc_token(htlc).await?;
        if approved.contains(&(token, htlc)) {
            return Ok(());
        }
        let allowance = initiator.allowance(token, htlc).await?;
        if allowance == U256::MAX {
            approved.insert((token, htlc));
            return Ok(());
        }
        if allowance < amount {
            info!(%token, spender = %htlc, "Approving HTLC to spend tokens");
            if let Err(err) = initiator.approve(token, htlc, U256::MAX).await {
                let balance = initiator
                    .token_balance(token)
                    .await
                    .map(|balance| balance.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                warn!(address = %initiator.address(), %balance, error = %err, "Approval failed");
                return Err(SwapError::Validation(format!(
                    "approval of {token} for {htlc} from {} failed (token balance {balance}): {err}",
                    initiator.address()
                )));
            }
            approved.insert((token, htlc));
        }
        Ok(())
    }
}
