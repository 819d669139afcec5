use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use swap_client::{
    ApiClient, Asset, Chain, ChainActionError, ChainFamily, MatchedOrder, OrderSecret,
    RelayClient, Result, RetryConfig, SecretManager, SwapError,
};
use tracing::debug;

use super::ChainWallet;

#[derive(Debug, Deserialize)]
struct TxoStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    chain_stats: TxoStats,
}

/// Bitcoin side of a swap, keyed by the master secret.
///
/// Chain state comes from an Esplora explorer. Redeems are handed to the
/// orderbook relayer, which sweeps the HTLC to the order's recipient.
pub struct BitcoinWallet {
    chain: Chain,
    address: String,
    x_only_key: String,
    explorer: ApiClient,
    relay: Arc<RelayClient>,
}

impl BitcoinWallet {
    pub fn from_secrets(
        chain: Chain,
        explorer_url: &str,
        secrets: &SecretManager,
        relay: Arc<RelayClient>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let network = match (chain.family(), chain.bitcoin_network()) {
            (ChainFamily::Bitcoin, Some(network)) => network,
            _ => {
                return Err(SwapError::Configuration(format!("{chain} is not a bitcoin chain")))
            }
        };
        Ok(Self {
            chain,
            address: secrets.bitcoin_address(network)?,
            x_only_key: secrets.bitcoin_x_only_key(network)?,
            explorer: ApiClient::new("explorer", explorer_url, retry)?,
            relay,
        })
    }
}

#[async_trait]
impl ChainWallet for BitcoinWallet {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn htlc_identity(&self) -> String {
        self.x_only_key.clone()
    }

    /// Confirmed balance in satoshis.
    async fn balance(&self, _asset: &Asset) -> Result<U256> {
        let info: AddressInfo = self
            .explorer
            .get_raw(&format!("address/{}", self.address))
            .await?;
        let stats = info.chain_stats;
        Ok(U256::from(stats.funded_txo_sum.saturating_sub(stats.spent_txo_sum)))
    }

    async fn block_height(&self) -> Result<u64> {
        self.explorer.get_raw("blocks/tip/height").await
    }

    async fn redeem(&self, order: &MatchedOrder, secret: &OrderSecret) -> Result<String> {
        debug!(order_id = order.id(), "Relaying bitcoin redeem");
        self.relay.redeem(order.id(), secret).await
    }

    /// Bitcoin is only ever the destination leg, which the counterparty refunds.
    async fn refund(&self, order: &MatchedOrder) -> Result<String> {
        Err(ChainActionError::Unsupported(format!(
            "bitcoin HTLC refund for order {}",
            order.id()
        ))
        .into())
    }
}
