//! Swap parameters and the orderbook's order records.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::assets::{Asset, ChainFamily, OrderPair};
use crate::types::{Result, SwapError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalSwapData {
    pub strategy_id: String,
    /// Where the destination asset is delivered. Required for bitcoin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub from_asset: Asset,
    pub to_asset: Asset,
    pub send_amount: String,
    pub receive_amount: String,
    pub additional_data: AdditionalSwapData,
}

impl SwapParams {
    pub fn order_pair(&self) -> OrderPair {
        OrderPair::new(&self.from_asset, &self.to_asset)
    }

    pub fn validate(&self) -> Result<()> {
        if self.from_asset == self.to_asset {
            return Err(SwapError::Validation(
                "source and destination assets are the same".to_string(),
            ));
        }
        if self.from_asset.chain.family() != ChainFamily::Evm {
            return Err(SwapError::Validation(format!(
                "source asset on {} cannot be initiated or refunded; only EVM sources are supported",
                self.from_asset.chain
            )));
        }
        let send = parse_amount(&self.send_amount)?;
        let receive = parse_amount(&self.receive_amount)?;
        if send.is_zero() || receive.is_zero() {
            return Err(SwapError::Validation("amounts must be greater than zero".to_string()));
        }
        if self.additional_data.strategy_id.trim().is_empty() {
            return Err(SwapError::Validation("strategy id is required".to_string()));
        }
        if self.to_asset.chain.family() == ChainFamily::Bitcoin
            && self
                .additional_data
                .destination_address
                .as_deref()
                .map_or(true, |address| address.trim().is_empty())
        {
            return Err(SwapError::Validation(
                "a bitcoin destination address is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a base-unit integer amount. The orderbook sometimes renders
/// integers with a trailing `.0`, which is accepted.
pub fn parse_amount(value: &str) -> Result<U256> {
    let trimmed = value.trim();
    let integer = match trimmed.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => {
            return Err(SwapError::Validation(format!("fractional base-unit amount: {value}")))
        }
        None => trimmed,
    };
    if integer.is_empty() || !integer.chars().all(|c| c.is_ascii_digit()) {
        return Err(SwapError::Validation(format!("invalid amount: {value}")));
    }
    U256::from_str_radix(integer, 10)
        .map_err(|err| SwapError::Validation(format!("invalid amount {value}: {err}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAdditionalData {
    pub strategy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoin_optional_recipient: Option<String>,
    #[serde(default)]
    pub input_token_price: f64,
    #[serde(default)]
    pub output_token_price: f64,
    #[serde(default)]
    pub sig: Option<String>,
    #[serde(default)]
    pub deadline: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_blacklisted: Option<bool>,
}

/// Body of `POST /relayer/create-order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub source_chain: String,
    pub destination_chain: String,
    pub source_asset: String,
    pub destination_asset: String,
    pub initiator_source_address: String,
    pub initiator_destination_address: String,
    pub source_amount: String,
    pub destination_amount: String,
    pub fee: String,
    pub nonce: String,
    pub min_destination_confirmations: u64,
    pub timelock: u64,
    pub secret_hash: String,
    pub additional_data: OrderAdditionalData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub create_id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub block_number: u64,
    pub source_chain: String,
    pub destination_chain: String,
    pub source_asset: String,
    pub destination_asset: String,
    pub initiator_source_address: String,
    pub initiator_destination_address: String,
    pub source_amount: String,
    pub destination_amount: String,
    #[serde(default)]
    pub fee: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub nonce: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub min_destination_confirmations: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub timelock: u64,
    pub secret_hash: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub additional_data: OrderAdditionalData,
}

/// One HTLC leg of a matched order as tracked by the orderbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapLeg {
    /// On-chain HTLC order id.
    pub swap_id: String,
    pub chain: String,
    pub asset: String,
    pub initiator: String,
    pub redeemer: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub timelock: u64,
    #[serde(default)]
    pub filled_amount: String,
    pub amount: String,
    pub secret_hash: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub initiate_tx_hash: String,
    #[serde(default)]
    pub redeem_tx_hash: String,
    #[serde(default)]
    pub refund_tx_hash: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub initiate_block_number: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub redeem_block_number: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub refund_block_number: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub required_confirmations: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub current_confirmations: u64,
}

impl SwapLeg {
    pub fn is_initiated(&self) -> bool {
        has_tx(&self.initiate_tx_hash)
    }

    pub fn is_redeemed(&self) -> bool {
        has_tx(&self.redeem_tx_hash)
    }

    pub fn is_refunded(&self) -> bool {
        has_tx(&self.refund_tx_hash)
    }

    pub fn initiate_block(&self) -> Option<u64> {
        (self.is_initiated() && self.initiate_block_number > 0).then_some(self.initiate_block_number)
    }

    /// Block height at which the initiator may refund, once mined.
    pub fn refund_height(&self) -> Option<u64> {
        self.initiate_block()
            .map(|height| height.saturating_add(self.timelock))
    }
}

fn has_tx(hash: &str) -> bool {
    let hash = hash.trim();
    !hash.is_empty() && hash != "0x"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedOrder {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub source_swap: SwapLeg,
    pub destination_swap: SwapLeg,
    pub create_order: CreateOrder,
}

impl MatchedOrder {
    pub fn id(&self) -> &str {
        &self.create_order.create_id
    }

    /// Index the order secret was derived with.
    pub fn secret_index(&self) -> u64 {
        self.create_order.nonce
    }
}

/// Accepts `12`, `"12"`, `"12.0"` and `""` (as zero).
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(value),
        Raw::Float(value) if value >= 0.0 => Ok(value as u64),
        Raw::Float(value) => Err(serde::de::Error::custom(format!("negative number {value}"))),
        Raw::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(0);
            }
            let whole = text.split_once('.').map_or(text, |(whole, _)| whole);
            whole.parse().map_err(serde::de::Error::custom)
        }
    }
}
