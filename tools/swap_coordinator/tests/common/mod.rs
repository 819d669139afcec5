#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use swap_client::{
    Asset, Attestation, Chain, ChainActionError, CreateOrder, CreateOrderRequest, MasterSecret,
    MatchedOrder, OrderAdditionalData, OrderPair, OrderSecret, Orderbook, Quote, QuoteProvider,
    Result, SecretManager, SwapLeg, NATIVE_MARKER,
};
use swap_coordinator::metrics::SwapMetrics;
use swap_coordinator::wallet::{ChainWallet, WalletRegistry};
use swap_coordinator::{Garden, GardenConfig, OrderStatus, SwapEvent};
use tokio::sync::broadcast;

pub const SOURCE: Chain = Chain::EthereumSepolia;
pub const DESTINATION: Chain = Chain::BitcoinTestnet;
pub const SOURCE_HTLC: &str = "0x3c6a17b8cd92976d1d91e491c93c98cd81998265";

pub fn secrets() -> SecretManager {
    SecretManager::from_master(MasterSecret::from_bytes([7u8; 32]))
}

pub fn source_asset() -> Asset {
    Asset::new(SOURCE, SOURCE_HTLC, 8, "WBTC")
}

pub fn destination_asset() -> Asset {
    Asset::new(DESTINATION, NATIVE_MARKER, 8, "BTC")
}

pub fn leg(chain: Chain, asset: &str, amount: &str, timelock: u64, secret_hash: &str) -> SwapLeg {
    SwapLeg {
        swap_id: format!("0x{}", "11".repeat(32)),
        chain: chain.to_string(),
        asset: asset.to_string(),
        initiator: "0xinitiator".to_string(),
        redeemer: "0xredeemer".to_string(),
        timelock,
        filled_amount: String::new(),
        amount: amount.to_string(),
        secret_hash: secret_hash.to_string(),
        secret: String::new(),
        initiate_tx_hash: String::new(),
        redeem_tx_hash: String::new(),
        refund_tx_hash: String::new(),
        initiate_block_number: 0,
        redeem_block_number: 0,
        refund_block_number: 0,
        required_confirmations: 1,
        current_confirmations: 0,
    }
}

/// A matched EVM -> bitcoin order committed to the secret at `nonce`.
pub fn matched_order(id: &str, nonce: u64) -> MatchedOrder {
    let hash = secrets().derive_order_secret(nonce).unwrap().hash_hex();
    MatchedOrder {
        created_at: Utc::now(),
        updated_at: None,
        source_swap: leg(SOURCE, SOURCE_HTLC, "1000000", 50, &hash),
        destination_swap: leg(DESTINATION, NATIVE_MARKER, "990000", 12, &hash),
        create_order: CreateOrder {
            create_id: id.to_string(),
            block_number: 0,
            source_chain: SOURCE.to_string(),
            destination_chain: DESTINATION.to_string(),
            source_asset: SOURCE_HTLC.to_string(),
            destination_asset: NATIVE_MARKER.to_string(),
            initiator_source_address: "0xinitiator".to_string(),
            initiator_destination_address: "02initiator".to_string(),
            source_amount: "1000000".to_string(),
            destination_amount: "990000".to_string(),
            fee: "1".to_string(),
            nonce,
            min_destination_confirmations: 0,
            timelock: 50,
            secret_hash: hash,
            user_id: None,
            additional_data: OrderAdditionalData {
                strategy_id: "s1".to_string(),
                bitcoin_optional_recipient: None,
                input_token_price: 0.0,
                output_token_price: 0.0,
                sig: None,
                deadline: 0,
                tx_hash: None,
                is_blacklisted: None,
            },
        },
    }
}

pub fn initiate(leg: &mut SwapLeg, block: u64) {
    leg.initiate_tx_hash = format!("0xinit{block}");
    leg.initiate_block_number = block;
}

pub fn clear_initiate(leg: &mut SwapLeg) {
    leg.initiate_tx_hash.clear();
    leg.initiate_block_number = 0;
}

pub fn mark_redeemed(leg: &mut SwapLeg, block: u64) {
    leg.redeem_tx_hash = "0xredeemed".to_string();
    leg.redeem_block_number = block;
}

/// Order whose destination leg is locked and confirmed at the mock tips.
pub fn redeemable_order(id: &str, nonce: u64) -> MatchedOrder {
    let mut order = matched_order(id, nonce);
    initiate(&mut order.source_swap, 100);
    initiate(&mut order.destination_swap, 1_000);
    order
}

#[derive(Default)]
pub struct MockOrderbook {
    pub orders: Mutex<BTreeMap<String, MatchedOrder>>,
    pub created: Mutex<Vec<CreateOrderRequest>>,
    pub count: AtomicU64,
    pub hide_pending: AtomicBool,
    /// Keep listing orders whose destination leg is already redeemed.
    pub list_redeemed: AtomicBool,
}

impl MockOrderbook {
    pub fn with_order(order: MatchedOrder) -> Arc<Self> {
        let book = Self::default();
        book.insert(order);
        Arc::new(book)
    }

    pub fn insert(&self, order: MatchedOrder) {
        self.orders
            .lock()
            .unwrap()
            .insert(order.id().to_string(), order);
    }

    pub fn update(&self, id: &str, change: impl FnOnce(&mut MatchedOrder)) {
        let mut orders = self.orders.lock().unwrap();
        change(orders.get_mut(id).expect("known order"));
    }

    pub fn created(&self) -> Vec<CreateOrderRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl Orderbook for MockOrderbook {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<String> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("order-{}", created.len());

        let mut order = matched_order(&id, request.nonce.parse().unwrap());
        order.create_order.destination_amount = request.destination_amount.clone();
        order.create_order.secret_hash = request.secret_hash.clone();
        order.create_order.additional_data = request.additional_data.clone();
        self.insert(order);
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get_order(&self, id: &str) -> Result<Option<MatchedOrder>> {
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn pending_orders(&self, _address: &str) -> Result<Vec<MatchedOrder>> {
        if self.hide_pending.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let list_redeemed = self.list_redeemed.load(Ordering::SeqCst);
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|order| {
                (list_redeemed || order.destination_swap.redeem_block_number == 0)
                    && !order.source_swap.is_refunded()
            })
            .cloned()
            .collect())
    }

    async fn orders_count(&self, _address: &str) -> Result<u64> {
        Ok(self.count.load(Ordering::SeqCst))
    }
}

pub struct MockQuotes {
    pub quotes: serde_json::Value,
    pub attested: Mutex<Vec<CreateOrderRequest>>,
}

impl MockQuotes {
    pub fn new(quotes: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            quotes,
            attested: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl QuoteProvider for MockQuotes {
    async fn get_quote(&self, _pair: &OrderPair, _amount: &str) -> Result<Quote> {
        Ok(serde_json::from_value(json!({ "quotes": self.quotes }))?)
    }

    async fn get_attested_quote(&self, order: &CreateOrderRequest) -> Result<Attestation> {
        self.attested.lock().unwrap().push(order.clone());
        Ok(Attestation {
            sig: "0xattested".to_string(),
            input_token_price: 1.0,
            output_token_price: 1.0,
            deadline: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletCall {
    Initiate(String),
    Redeem { order_id: String, secret: String },
    Refund(String),
}

pub struct MockWallet {
    chain: Chain,
    pub height: AtomicU64,
    pub balance: Mutex<U256>,
    pub settled: AtomicBool,
    pub calls: Mutex<Vec<WalletCall>>,
}

impl MockWallet {
    pub fn new(chain: Chain, height: u64) -> Arc<Self> {
        Arc::new(Self {
            chain,
            height: AtomicU64::new(height),
            balance: Mutex::new(U256::from(10_000_000u64)),
            settled: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<WalletCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn redeems(&self) -> Vec<WalletCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, WalletCall::Redeem { .. }))
            .collect()
    }

    fn record(&self, call: WalletCall) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.len()
    }
}

#[async_trait]
impl ChainWallet for MockWallet {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn address(&self) -> String {
        format!("{}-wallet", self.chain)
    }

    async fn balance(&self, _asset: &Asset) -> Result<U256> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn block_height(&self) -> Result<u64> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn initiate(&self, order: &MatchedOrder) -> Result<String> {
        let n = self.record(WalletCall::Initiate(order.id().to_string()));
        Ok(format!("0x{}-initiate-{n}", self.chain))
    }

    async fn redeem(&self, order: &MatchedOrder, secret: &OrderSecret) -> Result<String> {
        let n = self.record(WalletCall::Redeem {
            order_id: order.id().to_string(),
            secret: secret.secret_hex(),
        });
        if self.settled.load(Ordering::SeqCst) {
            return Err(ChainActionError::classify("HTLC: order fulfilled").into());
        }
        Ok(format!("0x{}-redeem-{n}", self.chain))
    }

    async fn refund(&self, order: &MatchedOrder) -> Result<String> {
        let n = self.record(WalletCall::Refund(order.id().to_string()));
        Ok(format!("0x{}-refund-{n}", self.chain))
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub transitions: Arc<Mutex<Vec<(String, String)>>>,
    pub latencies: Arc<Mutex<Vec<String>>>,
}

impl RecordingMetrics {
    pub fn transitions(&self) -> Vec<(String, String)> {
        self.transitions.lock().unwrap().clone()
    }
}

impl SwapMetrics for RecordingMetrics {
    fn record_transition(&self, _order_id: &str, from: Option<OrderStatus>, to: OrderStatus) {
        self.transitions.lock().unwrap().push((
            from.map_or("none", |status| status.as_str()).to_string(),
            to.as_str().to_string(),
        ));
    }

    fn record_latency(&self, stage: &'static str, _elapsed: Duration) {
        self.latencies.lock().unwrap().push(stage.to_string());
    }
}

pub struct Harness {
    pub orderbook: Arc<MockOrderbook>,
    pub quotes: Arc<MockQuotes>,
    pub source: Arc<MockWallet>,
    pub destination: Arc<MockWallet>,
    pub metrics: Arc<RecordingMetrics>,
    pub garden: Garden,
    pub events: broadcast::Receiver<SwapEvent>,
}

impl Harness {
    pub fn new(orderbook: Arc<MockOrderbook>) -> Self {
        Self::with_config(orderbook, |_| {})
    }

    pub fn with_config(orderbook: Arc<MockOrderbook>, tune: impl FnOnce(&mut GardenConfig)) -> Self {
        let quotes = MockQuotes::new(json!({ "s1": "990000" }));
        let source = MockWallet::new(SOURCE, 120);
        let destination = MockWallet::new(DESTINATION, 1_000);
        let wallets = WalletRegistry::new()
            .with(source.clone())
            .with(destination.clone());
        let mut config = GardenConfig {
            poll_interval: Duration::from_millis(10),
            match_timeout: Duration::from_secs(1),
            match_poll_interval: Duration::from_millis(10),
            ..GardenConfig::default()
        };
        tune(&mut config);
        let metrics = Arc::new(RecordingMetrics::default());
        let garden = Garden::new(
            orderbook.clone(),
            quotes.clone(),
            Arc::new(secrets()),
            wallets,
            "0xuser".to_string(),
            config,
        )
        .with_metrics(metrics.clone());
        let events = garden.subscribe();
        Self {
            orderbook,
            quotes,
            source,
            destination,
            metrics,
            garden,
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<SwapEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
