//! Per-order driver: observe both legs, classify, perform at most one action.

use std::time::Instant;

use swap_client::{
    ChainActionError, LegWatcher, MatchedOrder, Result, SecretManager, WatcherConfig,
    WatcherEvent,
};
use tracing::{info, warn};

use crate::metrics::SwapMetrics;
use crate::state::{classify, next_action, ActionPolicy, ChainView, OrderStatus, PendingAction, SwapAction};
use crate::wallet::{ChainWallet, WalletRegistry};

/// Loop-owned bookkeeping for one order.
#[derive(Debug, Clone)]
pub struct TrackedOrder {
    order: MatchedOrder,
    source: LegWatcher,
    destination: LegWatcher,
    pending: Option<PendingAction>,
    status: Option<OrderStatus>,
}

impl TrackedOrder {
    pub fn new(order: MatchedOrder, watcher: WatcherConfig) -> Self {
        Self {
            order,
            source: LegWatcher::new(watcher),
            destination: LegWatcher::new(watcher),
            pending: None,
            status: None,
        }
    }

    pub fn id(&self) -> &str {
        self.order.id()
    }

    pub fn order(&self) -> &MatchedOrder {
        &self.order
    }

    /// Replaces the orderbook snapshot; local bookkeeping is kept.
    pub fn refresh(&mut self, order: MatchedOrder) {
        self.order = order;
    }

    pub fn status(&self) -> Option<OrderStatus> {
        self.status
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }
}

pub struct StepContext<'a, M: SwapMetrics + ?Sized> {
    pub wallets: &'a WalletRegistry,
    pub secrets: &'a SecretManager,
    pub metrics: &'a M,
    pub policy: &'a ActionPolicy,
    pub cycle: u64,
    /// Unix seconds.
    pub now: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub status: OrderStatus,
    pub action: SwapAction,
    /// Set when a transaction was broadcast this step.
    pub tx_hash: Option<String>,
}

pub async fn step<M>(tracked: &mut TrackedOrder, ctx: &StepContext<'_, M>) -> Result<StepOutcome>
where
    M: SwapMetrics + ?Sized,
{
    let source_wallet = ctx.wallets.for_leg(&tracked.order.source_swap)?;
    let destination_wallet = ctx.wallets.for_leg(&tracked.order.destination_swap)?;
    let (source_height, destination_height) =
        tokio::try_join!(source_wallet.block_height(), destination_wallet.block_height())?;
    let view = ChainView {
        source_height,
        destination_height,
        now: ctx.now,
    };

    let source_event = tracked
        .source
        .observe_leg(&tracked.order.source_swap, source_height);
    let destination_event = tracked
        .destination
        .observe_leg(&tracked.order.destination_swap, destination_height);
    drop_reorged_pending(tracked, source_event, destination_event);

    let status = classify(&tracked.order, destination_event, &view);
    if tracked.status != Some(status) {
        info!(
            order_id = tracked.id(),
            from = tracked.status.map_or("none", |previous| previous.as_str()),
            to = status.as_str(),
            "Order status changed"
        );
        ctx.metrics.record_transition(tracked.id(), tracked.status, status);
        tracked.status = Some(status);
    }
    if status.is_terminal() {
        tracked.pending = None;
    } else if status == OrderStatus::RedeemPending && tracked.pending.is_none() {
        // Redeem seen on the orderbook but not by this process, e.g. after a restart.
        tracked.pending = Some(PendingAction {
            action: SwapAction::Redeem,
            tx_hash: tracked.order.destination_swap.redeem_tx_hash.clone(),
            cycle: ctx.cycle,
        });
    }

    let action = next_action(status, &tracked.order, tracked.pending.as_ref(), ctx.cycle, ctx.policy);
    let started = Instant::now();
    let result = match action {
        SwapAction::Idle => {
            return Ok(StepOutcome {
                status,
                action,
                tx_hash: None,
            })
        }
        SwapAction::Redeem => redeem(&tracked.order, ctx.secrets, destination_wallet.as_ref()).await,
        SwapAction::Refund => source_wallet.refund(&tracked.order).await,
        SwapAction::Initiate => source_wallet.initiate(&tracked.order).await,
    };
    ctx.metrics.record_latency(stage_name(action), started.elapsed());

    match result {
        Ok(tx_hash) => {
            info!(order_id = tracked.id(), %action, %tx_hash, "Broadcast succeeded");
            tracked.pending = Some(PendingAction {
                action,
                tx_hash: tx_hash.clone(),
                cycle: ctx.cycle,
            });
            Ok(StepOutcome {
                status,
                action,
                tx_hash: Some(tx_hash),
            })
        }
        Err(err) if err.is_benign() => {
            info!(order_id = tracked.id(), %action, error = %err, "Already settled; waiting for orderbook");
            tracked.pending = Some(PendingAction {
                action,
                tx_hash: String::new(),
                cycle: ctx.cycle,
            });
            Ok(StepOutcome {
                status,
                action,
                tx_hash: None,
            })
        }
        Err(err) => Err(err),
    }
}

async fn redeem(
    order: &MatchedOrder,
    secrets: &SecretManager,
    wallet: &dyn ChainWallet,
) -> Result<String> {
    let secret = secrets.derive_order_secret(order.secret_index())?;
    if !secret.matches_hash(&order.destination_swap.secret_hash) {
        return Err(ChainActionError::SecretMismatch {
            order_id: order.id().to_string(),
        }
        .into());
    }
    wallet.redeem(order, &secret).await
}

fn drop_reorged_pending(
    tracked: &mut TrackedOrder,
    source: WatcherEvent,
    destination: WatcherEvent,
) {
    let reorged = |event: WatcherEvent| matches!(event, WatcherEvent::ReorgDetected { .. });
    let stale = match tracked.pending.as_ref().map(|pending| pending.action) {
        Some(SwapAction::Redeem) => reorged(destination),
        Some(SwapAction::Initiate | SwapAction::Refund) => reorged(source),
        _ => false,
    };
    if stale {
        warn!(order_id = tracked.id(), "Reorg invalidated pending broadcast");
        tracked.pending = None;
    }
}

fn stage_name(action: SwapAction) -> &'static str {
    match action {
        SwapAction::Initiate => "initiate",
        SwapAction::Redeem => "redeem",
        SwapAction::Refund => "refund",
        SwapAction::Idle => "idle",
    }
}
