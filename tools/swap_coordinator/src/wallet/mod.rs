//! Per-chain signing and broadcast capabilities.

mod btc;
mod evm;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use swap_client::{Asset, Chain, ChainActionError, MatchedOrder, OrderSecret, Result, SwapLeg};

pub use self::btc::BitcoinWallet;
pub use self::evm::EvmWallet;

#[async_trait]
pub trait ChainWallet: Send + Sync {
    fn chain(&self) -> Chain;

    /// Address funds are sent from and delivered to.
    fn address(&self) -> String;

    /// Identity placed in the order for this chain's HTLC.
    fn htlc_identity(&self) -> String {
        self.address()
    }

    async fn balance(&self, asset: &Asset) -> Result<U256>;

    async fn block_height(&self) -> Result<u64>;

    /// Locks the source leg directly on-chain.
    async fn initiate(&self, order: &MatchedOrder) -> Result<String> {
        Err(ChainActionError::Unsupported(format!(
            "direct initiation of order {} on {}",
            order.id(),
            self.chain()
        ))
        .into())
    }

    /// Claims the destination leg, revealing `secret`.
    async fn redeem(&self, order: &MatchedOrder, secret: &OrderSecret) -> Result<String>;

    /// Reclaims the expired source leg.
    async fn refund(&self, order: &MatchedOrder) -> Result<String>;
}

#[derive(Default, Clone)]
pub struct WalletRegistry {
    wallets: HashMap<Chain, Arc<dyn ChainWallet>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, wallet: Arc<dyn ChainWallet>) {
        self.wallets.insert(wallet.chain(), wallet);
    }

    pub fn with(mut self, wallet: Arc<dyn ChainWallet>) -> Self {
        self.register(wallet);
        self
    }

    pub fn get(&self, chain: Chain) -> Result<Arc<dyn ChainWallet>> {
        self.wallets
            .get(&chain)
            .cloned()
            .ok_or_else(|| ChainActionError::NoWallet(chain.to_string()).into())
    }

    pub fn for_leg(&self, leg: &SwapLeg) -> Result<Arc<dyn ChainWallet>> {
        self.get(Chain::from_str(&leg.chain)?)
    }
}
