//! Pricing service: strategy quotes and order attestations.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::assets::OrderPair;
use crate::orders::{parse_amount, CreateOrderRequest};
use crate::rpc::{ApiClient, RetryConfig};
use crate::types::{Result, SwapError};

/// Receive amounts per strategy, in the order the service listed them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Quote {
    #[serde(deserialize_with = "ordered_quotes")]
    pub quotes: Vec<(String, String)>,
    #[serde(default)]
    pub input_token_price: f64,
    #[serde(default)]
    pub output_token_price: f64,
}

impl Quote {
    pub fn select(&self, selection: &QuoteSelection) -> Result<(String, String)> {
        if self.quotes.is_empty() {
            return Err(SwapError::Validation("no quotes available for this pair".to_string()));
        }
        let chosen = match selection {
            QuoteSelection::First => self.quotes.first(),
            QuoteSelection::BestReceive => {
                let mut best: Option<(&(String, String), U256)> = None;
                for entry in &self.quotes {
                    let amount = parse_amount(&entry.1)?;
                    if best.as_ref().map_or(true, |(_, current)| amount > *current) {
                        best = Some((entry, amount));
                    }
                }
                best.map(|(entry, _)| entry)
            }
            QuoteSelection::Strategy(id) => self.quotes.iter().find(|(strategy, _)| strategy == id),
        };
        chosen.cloned().ok_or_else(|| {
            SwapError::Validation(format!("no quote matches selection {selection}"))
        })
    }
}

/// How a strategy is picked from a [`Quote`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuoteSelection {
    #[default]
    First,
    BestReceive,
    Strategy(String),
}

impl fmt::Display for QuoteSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSelection::First => f.write_str("first"),
            QuoteSelection::BestReceive => f.write_str("best"),
            QuoteSelection::Strategy(id) => write!(f, "strategy:{id}"),
        }
    }
}

impl FromStr for QuoteSelection {
    type Err = SwapError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        match value {
            "first" => Ok(QuoteSelection::First),
            "best" => Ok(QuoteSelection::BestReceive),
            _ => match value.strip_prefix("strategy:") {
                Some(id) if !id.is_empty() => Ok(QuoteSelection::Strategy(id.to_string())),
                _ => Err(SwapError::Configuration(format!(
                    "invalid quote selection {value} (expected first, best or strategy:<id>)"
                ))),
            },
        }
    }
}

/// Pricing signature the orderbook requires on order creation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Attestation {
    pub sig: String,
    #[serde(default)]
    pub input_token_price: f64,
    #[serde(default)]
    pub output_token_price: f64,
    #[serde(default)]
    pub deadline: i64,
}

impl Attestation {
    pub fn apply(&self, order: &mut CreateOrderRequest) {
        order.additional_data.sig = Some(self.sig.clone());
        order.additional_data.input_token_price = self.input_token_price;
        order.additional_data.output_token_price = self.output_token_price;
        if self.deadline > 0 {
            order.additional_data.deadline = self.deadline;
        }
    }
}

#[derive(Deserialize)]
struct AttestedOrder {
    additional_data: Attestation,
}

#[derive(Serialize)]
struct SignableAdditionalData<'a> {
    strategy_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bitcoin_optional_recipient: Option<&'a str>,
}

/// Draft order as submitted for attestation: pricing fields are filled by the service.
#[derive(Serialize)]
struct SignableOrder<'a> {
    source_chain: &'a str,
    destination_chain: &'a str,
    source_asset: &'a str,
    destination_asset: &'a str,
    initiator_source_address: &'a str,
    initiator_destination_address: &'a str,
    source_amount: &'a str,
    destination_amount: &'a str,
    fee: &'a str,
    nonce: &'a str,
    min_destination_confirmations: u64,
    timelock: u64,
    secret_hash: &'a str,
    additional_data: SignableAdditionalData<'a>,
}

impl<'a> From<&'a CreateOrderRequest> for SignableOrder<'a> {
    fn from(order: &'a CreateOrderRequest) -> Self {
        Self {
            source_chain: &order.source_chain,
            destination_chain: &order.destination_chain,
            source_asset: &order.source_asset,
            destination_asset: &order.destination_asset,
            initiator_source_address: &order.initiator_source_address,
            initiator_destination_address: &order.initiator_destination_address,
            source_amount: &order.source_amount,
            destination_amount: &order.destination_amount,
            fee: &order.fee,
            nonce: &order.nonce,
            min_destination_confirmations: order.min_destination_confirmations,
            timelock: order.timelock,
            secret_hash: &order.secret_hash,
            additional_data: SignableAdditionalData {
                strategy_id: &order.additional_data.strategy_id,
                bitcoin_optional_recipient: order
                    .additional_data
                    .bitcoin_optional_recipient
                    .as_deref(),
            },
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_quote(&self, order_pair: &OrderPair, amount: &str) -> Result<Quote>;

    async fn get_attested_quote(&self, order: &CreateOrderRequest) -> Result<Attestation>;
}

pub struct QuoteClient {
    api: ApiClient,
}

impl QuoteClient {
    pub fn new(base_url: &str, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("quote", base_url, retry)?,
        })
    }
}

#[async_trait]
impl QuoteProvider for QuoteClient {
    async fn get_quote(&self, order_pair: &OrderPair, amount: &str) -> Result<Quote> {
        let amount = parse_amount(amount)?;
        debug!(%order_pair, %amount, "Fetching quote");
        self.api
            .get(
                &format!("quote?order_pair={order_pair}&amount={amount}&exact_out=false"),
                None,
            )
            .await
    }

    async fn get_attested_quote(&self, order: &CreateOrderRequest) -> Result<Attestation> {
        debug!(nonce = %order.nonce, "Requesting quote attestation");
        let attested: AttestedOrder = self
            .api
            .post("quote/attested", &SignableOrder::from(order), None)
            .await?;
        if attested.additional_data.sig.trim().is_empty() {
            return Err(SwapError::Protocol {
                service: "quote",
                message: "attestation without signature".to_string(),
            });
        }
        Ok(attested.additional_data)
    }
}

/// Keeps the service's strategy order; amounts may arrive as strings or numbers.
fn ordered_quotes<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Int(u64),
        Float(f64),
    }

    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of strategy id to receive amount")
        }

        fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> std::result::Result<Self::Value, M::Error> {
            let mut quotes = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((strategy, amount)) = map.next_entry::<String, Amount>()? {
                let amount = match amount {
                    Amount::Text(text) => text,
                    Amount::Int(value) => value.to_string(),
                    Amount::Float(value) => format!("{value:.0}"),
                };
                quotes.push((strategy, amount));
            }
            Ok(quotes)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}
