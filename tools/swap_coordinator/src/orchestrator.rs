//! `Garden`: order submission and the execute loop.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use swap_client::{
    parse_amount, AdditionalSwapData, Asset, ChainFamily, CreateOrderRequest, MatchedOrder,
    OrderAdditionalData, Orderbook, QuoteProvider, QuoteSelection, Result, SecretManager,
    SwapError, SwapParams, WatcherConfig,
};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::driver::{step, StepContext, TrackedOrder};
use crate::events::SwapEvent;
use crate::metrics::{NoopMetrics, SwapMetrics};
use crate::state::ActionPolicy;
use crate::wallet::WalletRegistry;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct GardenConfig {
    pub poll_interval: Duration,
    pub match_timeout: Duration,
    pub match_poll_interval: Duration,
    /// Lifetime of an unfunded order.
    pub order_deadline: Duration,
    pub min_destination_confirmations: u64,
    pub fee: String,
    pub policy: ActionPolicy,
    pub watcher: WatcherConfig,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            match_timeout: Duration::from_secs(120),
            match_poll_interval: Duration::from_secs(2),
            order_deadline: Duration::from_secs(600),
            min_destination_confirmations: 0,
            fee: "1".to_string(),
            policy: ActionPolicy::default(),
            watcher: WatcherConfig::default(),
        }
    }
}

/// Orders owned by one execute loop, keyed by order id.
#[derive(Debug, Default)]
pub struct TrackedOrders {
    orders: BTreeMap<String, TrackedOrder>,
    /// Ids that reached a terminal status; the orderbook may keep listing them.
    settled: BTreeSet<String>,
}

impl TrackedOrders {
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TrackedOrder> {
        self.orders.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.orders.contains_key(id)
    }

    pub fn is_settled(&self, id: &str) -> bool {
        self.settled.contains(id)
    }

    /// Starts tracking `order`, or refreshes the snapshot of a known one.
    /// Settled orders are ignored.
    pub fn upsert(&mut self, order: MatchedOrder, watcher: WatcherConfig) {
        if self.settled.contains(order.id()) {
            return;
        }
        match self.orders.get_mut(order.id()) {
            Some(tracked) => tracked.refresh(order),
            None => {
                debug!(order_id = order.id(), "Tracking order");
                self.orders
                    .insert(order.id().to_string(), TrackedOrder::new(order, watcher));
            }
        }
    }
}

pub struct Garden {
    orderbook: Arc<dyn Orderbook>,
    quotes: Arc<dyn QuoteProvider>,
    secrets: Arc<SecretManager>,
    wallets: WalletRegistry,
    metrics: Arc<dyn SwapMetrics>,
    identity: String,
    config: GardenConfig,
    events: broadcast::Sender<SwapEvent>,
    new_orders: mpsc::UnboundedSender<MatchedOrder>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<MatchedOrder>>>,
}

impl Garden {
    /// `identity` is the EVM address the orderbook knows this user by.
    pub fn new(
        orderbook: Arc<dyn Orderbook>,
        quotes: Arc<dyn QuoteProvider>,
        secrets: Arc<SecretManager>,
        wallets: WalletRegistry,
        identity: String,
        config: GardenConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (new_orders, inbox) = mpsc::unbounded_channel();
        Self {
            orderbook,
            quotes,
            secrets,
            wallets,
            metrics: Arc::new(NoopMetrics),
            identity,
            config,
            events,
            new_orders,
            inbox: Mutex::new(Some(inbox)),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn SwapMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.events.subscribe()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Quotes `send_amount` and turns the selected strategy into swap parameters.
    pub async fn prepare_swap(
        &self,
        from_asset: &Asset,
        to_asset: &Asset,
        send_amount: &str,
        selection: &QuoteSelection,
        destination_address: Option<String>,
    ) -> Result<SwapParams> {
        let pair = swap_client::OrderPair::new(from_asset, to_asset);
        let quote = self.quotes.get_quote(&pair, send_amount).await?;
        let (strategy_id, receive_amount) = quote.select(selection)?;
        info!(%pair, %strategy_id, %receive_amount, "Selected quote");
        Ok(SwapParams {
            from_asset: from_asset.clone(),
            to_asset: to_asset.clone(),
            send_amount: send_amount.to_string(),
            receive_amount,
            additional_data: AdditionalSwapData {
                strategy_id,
                destination_address,
            },
        })
    }

    /// Creates and submits an order, waits for its match and starts tracking it.
    pub async fn swap(&self, params: &SwapParams) -> Result<MatchedOrder> {
        params.validate()?;
        let source_wallet = self.wallets.get(params.from_asset.chain)?;
        let destination_wallet = self.wallets.get(params.to_asset.chain)?;

        let send_amount = parse_amount(&params.send_amount)?;
        let balance = source_wallet.balance(&params.from_asset).await?;
        if balance < send_amount {
            return Err(SwapError::InsufficientBalance(format!(
                "{} holds {balance} of {}, swap needs {send_amount}",
                source_wallet.address(),
                params.from_asset.symbol
            )));
        }

        let nonce = self.orderbook.orders_count(&self.identity).await? + 1;
        let secret = self.secrets.derive_order_secret(nonce)?;
        let deadline = Utc::now()
            + TimeDelta::from_std(self.config.order_deadline).unwrap_or(TimeDelta::minutes(10));
        let bitcoin_recipient = match params.to_asset.chain.family() {
            ChainFamily::Bitcoin => params.additional_data.destination_address.clone(),
            ChainFamily::Evm => None,
        };

        let mut request = CreateOrderRequest {
            source_chain: params.from_asset.chain.to_string(),
            destination_chain: params.to_asset.chain.to_string(),
            source_asset: params.from_asset.atomic_swap_address.clone(),
            destination_asset: params.to_asset.atomic_swap_address.clone(),
            initiator_source_address: source_wallet.htlc_identity(),
            initiator_destination_address: destination_wallet.htlc_identity(),
            source_amount: send_amount.to_string(),
            destination_amount: parse_amount(&params.receive_amount)?.to_string(),
            fee: self.config.fee.clone(),
            nonce: nonce.to_string(),
            min_destination_confirmations: self.config.min_destination_confirmations,
            timelock: params.from_asset.chain.default_timelock(),
            secret_hash: secret.hash_hex(),
            additional_data: OrderAdditionalData {
                strategy_id: params.additional_data.strategy_id.clone(),
                bitcoin_optional_recipient: bitcoin_recipient,
                input_token_price: 0.0,
                output_token_price: 0.0,
                sig: None,
                deadline: deadline.timestamp(),
                tx_hash: None,
                is_blacklisted: None,
            },
        };
        let attestation = self.quotes.get_attested_quote(&request).await?;
        attestation.apply(&mut request);

        let order_id = self.orderbook.create_order(&request).await?;
        let order = self
            .orderbook
            .wait_for_match(
                &order_id,
                self.config.match_timeout,
                self.config.match_poll_interval,
            )
            .await?;
        info!(order_id = %order_id, nonce, "Order matched");
        self.track(order.clone());
        Ok(order)
    }

    /// Hands an order to the execute loop.
    pub fn track(&self, order: MatchedOrder) {
        if self.new_orders.send(order).is_err() {
            warn!("Execute loop inbox closed; order will be picked up from the orderbook");
        }
    }

    /// Runs poll cycles until `shutdown` turns true or its sender is dropped.
    /// Shutdown is only observed between cycles.
    pub async fn execute(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut inbox = self.inbox.lock().await.take().ok_or_else(|| {
            SwapError::Configuration("execute loop is already running".to_string())
        })?;
        let mut tracked = TrackedOrders::default();
        let mut cycle = 0u64;
        info!(identity = %self.identity, "Execute loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            while let Ok(order) = inbox.try_recv() {
                tracked.upsert(order, self.config.watcher);
            }
            self.poll_once(&mut tracked, cycle).await;
            cycle += 1;

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(tracked = tracked.len(), "Execute loop stopped");
        *self.inbox.lock().await = Some(inbox);
        Ok(())
    }

    /// One cycle: refresh every tracked order, then step them concurrently.
    pub async fn poll_once(&self, tracked: &mut TrackedOrders, cycle: u64) {
        match self.orderbook.pending_orders(&self.identity).await {
            Ok(orders) => {
                for order in orders {
                    tracked.upsert(order, self.config.watcher);
                }
            }
            Err(err) => warn!(error = %err, "Failed to list pending orders"),
        }

        let refreshed = join_all(
            tracked
                .orders
                .keys()
                .map(|id| async move { (id.clone(), self.orderbook.get_order(id).await) }),
        )
        .await;
        for (id, result) in refreshed {
            match result {
                Ok(Some(order)) => tracked.upsert(order, self.config.watcher),
                Ok(None) => debug!(order_id = %id, "Order not visible on orderbook"),
                Err(err) => warn!(order_id = %id, error = %err, "Failed to refresh order"),
            }
        }

        let ctx = StepContext {
            wallets: &self.wallets,
            secrets: self.secrets.as_ref(),
            metrics: self.metrics.as_ref(),
            policy: &self.config.policy,
            cycle,
            now: Utc::now().timestamp(),
        };
        let results = join_all(tracked.orders.values_mut().map(|order| {
            let ctx = &ctx;
            async move {
                let outcome = step(order, ctx).await;
                (order.id().to_string(), order.order().clone(), outcome)
            }
        }))
        .await;

        for (id, order, outcome) in results {
            match outcome {
                Ok(outcome) => {
                    if let Some(tx_hash) = outcome.tx_hash {
                        self.publish(SwapEvent::Success {
                            order: Box::new(order),
                            action: outcome.action,
                            tx_hash,
                        });
                    }
                    if outcome.status.is_terminal() {
                        info!(order_id = %id, status = %outcome.status, "Order settled; no longer tracked");
                        tracked.orders.remove(&id);
                        tracked.settled.insert(id);
                    }
                }
                Err(err) if err.is_transient() => {
                    warn!(order_id = %id, error = %err, "Transient failure; retrying next cycle")
                }
                Err(err) => {
                    error!(order_id = %id, error = %err, "Order action failed");
                    self.publish(SwapEvent::Error {
                        order: Box::new(order),
                        error: Arc::new(err),
                    });
                }
            }
        }
    }

    fn publish(&self, event: SwapEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
