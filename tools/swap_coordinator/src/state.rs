//! Order status and the next chain action.
//!
//! Status is recomputed every cycle from the orderbook's view of both legs,
//! the chain tips and the destination leg's confirmation depth. Nothing here
//! performs I/O.

use std::fmt;

use serde::{Deserialize, Serialize};
use swap_client::{MatchedOrder, SwapLeg, WatcherEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Matched; the counterparty has not locked the destination leg yet.
    Created,
    /// Destination leg locked but not confirmed deeply enough.
    CounterpartyInitiated,
    /// Destination leg confirmed; revealing the secret is safe.
    Redeemable,
    /// A redeem was broadcast and is not mined yet.
    RedeemPending,
    Redeemed,
    /// Source timelock elapsed without a redeem; the source leg can be refunded.
    Expired,
    Refunded,
    /// Never initiated before the order deadline; nothing is locked.
    DeadlinePassed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redeemed | Self::Refunded | Self::DeadlinePassed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::CounterpartyInitiated => "counterparty_initiated",
            Self::Redeemable => "redeemable",
            Self::RedeemPending => "redeem_pending",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
            Self::DeadlinePassed => "deadline_passed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapAction {
    Initiate,
    Redeem,
    Refund,
    Idle,
}

impl fmt::Display for SwapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiate => "initiate",
            Self::Redeem => "redeem",
            Self::Refund => "refund",
            Self::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Chain tips and wall clock sampled for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainView {
    pub source_height: u64,
    pub destination_height: u64,
    /// Unix seconds.
    pub now: i64,
}

/// A chain action this process broadcast and is waiting to see settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub action: SwapAction,
    pub tx_hash: String,
    /// Cycle the broadcast happened in.
    pub cycle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPolicy {
    /// Cycles to wait for a broadcast to show up before sending it again.
    pub resubmit_after_cycles: u64,
    /// Initiate the source leg from the local wallet instead of the relayer.
    pub initiate_on_chain: bool,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            resubmit_after_cycles: 60,
            initiate_on_chain: false,
        }
    }
}

pub fn source_expired(source: &SwapLeg, source_height: u64) -> bool {
    source
        .refund_height()
        .map_or(false, |refund_height| source_height >= refund_height)
}

pub fn classify(order: &MatchedOrder, destination: WatcherEvent, view: &ChainView) -> OrderStatus {
    let source = &order.source_swap;
    let target = &order.destination_swap;

    if source.is_refunded() {
        return OrderStatus::Refunded;
    }
    if target.is_redeemed() {
        return if target.redeem_block_number > 0 {
            OrderStatus::Redeemed
        } else {
            OrderStatus::RedeemPending
        };
    }
    if matches!(destination, WatcherEvent::Confirmed { .. }) && !target.is_refunded() {
        return OrderStatus::Redeemable;
    }
    if source_expired(source, view.source_height) {
        return OrderStatus::Expired;
    }
    if target.is_initiated() && !target.is_refunded() {
        return OrderStatus::CounterpartyInitiated;
    }
    let deadline = order.create_order.additional_data.deadline;
    if !source.is_initiated() && deadline > 0 && view.now > deadline {
        return OrderStatus::DeadlinePassed;
    }
    OrderStatus::Created
}

pub fn next_action(
    status: OrderStatus,
    order: &MatchedOrder,
    pending: Option<&PendingAction>,
    cycle: u64,
    policy: &ActionPolicy,
) -> SwapAction {
    // Holds back `action` while an earlier broadcast of it is still fresh.
    let unless_fresh = |action: SwapAction| match pending {
        Some(previous)
            if previous.action == action
                && cycle < previous.cycle.saturating_add(policy.resubmit_after_cycles) =>
        {
            SwapAction::Idle
        }
        _ => action,
    };

    match status {
        OrderStatus::Redeemable => unless_fresh(SwapAction::Redeem),
        OrderStatus::RedeemPending => match pending {
            Some(previous) if previous.action == SwapAction::Redeem => {
                unless_fresh(SwapAction::Redeem)
            }
            _ => SwapAction::Idle,
        },
        OrderStatus::Expired => unless_fresh(SwapAction::Refund),
        OrderStatus::Created
            if policy.initiate_on_chain && !order.source_swap.is_initiated() =>
        {
            unless_fresh(SwapAction::Initiate)
        }
        _ => SwapAction::Idle,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use swap_client::{CreateOrder, OrderAdditionalData};

    use super::*;

    fn leg(chain: &str, timelock: u64) -> SwapLeg {
        SwapLeg {
            swap_id: "0x01".to_string(),
            chain: chain.to_string(),
            asset: "0x3c6a17b8cd92976d1d91e491c93c98cd81998265".to_string(),
            initiator: "0xaa".to_string(),
            redeemer: "0xbb".to_string(),
            timelock,
            filled_amount: String::new(),
            amount: "1000000".to_string(),
            secret_hash: "00".repeat(32),
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

    fn order(deadline: i64) -> MatchedOrder {
        MatchedOrder {
            created_at: Utc::now(),
            updated_at: None,
            source_swap: leg("ethereum_sepolia", 50),
            destination_swap: leg("bitcoin_testnet", 12),
            create_order: CreateOrder {
                create_id: "order-1".to_string(),
                block_number: 0,
                source_chain: "ethereum_sepolia".to_string(),
                destination_chain: "bitcoin_testnet".to_string(),
                source_asset: "0x3c6a17b8cd92976d1d91e491c93c98cd81998265".to_string(),
                destination_asset: "primary".to_string(),
                initiator_source_address: "0xaa".to_string(),
                initiator_destination_address: "02aa".to_string(),
                source_amount: "1000000".to_string(),
                destination_amount: "990000".to_string(),
                fee: "1".to_string(),
                nonce: 1,
                min_destination_confirmations: 0,
                timelock: 50,
                secret_hash: "00".repeat(32),
                user_id: None,
                additional_data: OrderAdditionalData {
                    strategy_id: "s1".to_string(),
                    bitcoin_optional_recipient: None,
                    input_token_price: 0.0,
                    output_token_price: 0.0,
                    sig: None,
                    deadline,
                    tx_hash: None,
                    is_blacklisted: None,
                },
            },
        }
    }

    fn initiate(leg: &mut SwapLeg, block: u64) {
        leg.initiate_tx_hash = "0xinit".to_string();
        leg.initiate_block_number = block;
    }

    fn view(source_height: u64) -> ChainView {
        ChainView {
            source_height,
            destination_height: 1_000,
            now: 1_000,
        }
    }

    const CONFIRMED: WatcherEvent = WatcherEvent::Confirmed {
        observed_height: 990,
        confirmations: 11,
    };
    const AWAITING: WatcherEvent = WatcherEvent::AwaitingConfirmations {
        observed_height: 1_000,
        current_height: 1_000,
        remaining: 2,
    };

    #[test]
    fn walks_the_happy_path() {
        let mut order = order(0);
        assert_eq!(
            classify(&order, WatcherEvent::NotInitiated, &view(100)),
            OrderStatus::Created
        );

        initiate(&mut order.source_swap, 100);
        initiate(&mut order.destination_swap, 1_000);
        assert_eq!(classify(&order, AWAITING, &view(110)), OrderStatus::CounterpartyInitiated);
        assert_eq!(classify(&order, CONFIRMED, &view(110)), OrderStatus::Redeemable);

        order.destination_swap.redeem_tx_hash = "0xredeem".to_string();
        assert_eq!(classify(&order, CONFIRMED, &view(110)), OrderStatus::RedeemPending);
        order.destination_swap.redeem_block_number = 1_001;
        let status = classify(&order, CONFIRMED, &view(110));
        assert_eq!(status, OrderStatus::Redeemed);
        assert!(status.is_terminal());
    }

    #[test]
    fn expires_once_source_timelock_elapses() {
        let mut order = order(0);
        initiate(&mut order.source_swap, 100);
        assert_eq!(
            classify(&order, WatcherEvent::NotInitiated, &view(149)),
            OrderStatus::Created
        );
        assert_eq!(
            classify(&order, WatcherEvent::NotInitiated, &view(150)),
            OrderStatus::Expired
        );

        order.source_swap.refund_tx_hash = "0xrefund".to_string();
        assert_eq!(
            classify(&order, WatcherEvent::NotInitiated, &view(150)),
            OrderStatus::Refunded
        );
    }

    #[test]
    fn confirmed_destination_wins_over_expiry() {
        let mut order = order(0);
        initiate(&mut order.source_swap, 100);
        initiate(&mut order.destination_swap, 990);
        assert_eq!(classify(&order, CONFIRMED, &view(500)), OrderStatus::Redeemable);
        assert_eq!(classify(&order, AWAITING, &view(500)), OrderStatus::Expired);
    }

    #[test]
    fn unfunded_order_passes_its_deadline() {
        let order = order(900);
        assert_eq!(
            classify(&order, WatcherEvent::NotInitiated, &view(100)),
            OrderStatus::DeadlinePassed
        );
        let fresh = self::order(2_000);
        assert_eq!(
            classify(&fresh, WatcherEvent::NotInitiated, &view(100)),
            OrderStatus::Created
        );
    }

    #[test]
    fn redeem_is_resubmitted_only_after_threshold() {
        let order = order(0);
        let policy = ActionPolicy {
            resubmit_after_cycles: 3,
            initiate_on_chain: false,
        };
        let pending = PendingAction {
            action: SwapAction::Redeem,
            tx_hash: "0xredeem".to_string(),
            cycle: 10,
        };

        assert_eq!(
            next_action(OrderStatus::Redeemable, &order, None, 10, &policy),
            SwapAction::Redeem
        );
        assert_eq!(
            next_action(OrderStatus::RedeemPending, &order, Some(&pending), 12, &policy),
            SwapAction::Idle
        );
        assert_eq!(
            next_action(OrderStatus::RedeemPending, &order, Some(&pending), 13, &policy),
            SwapAction::Redeem
        );
        assert_eq!(
            next_action(OrderStatus::RedeemPending, &order, None, 13, &policy),
            SwapAction::Idle
        );
    }

    #[test]
    fn initiates_on_chain_only_when_enabled() {
        let order = order(0);
        let mut policy = ActionPolicy::default();
        assert_eq!(
            next_action(OrderStatus::Created, &order, None, 0, &policy),
            SwapAction::Idle
        );
        policy.initiate_on_chain = true;
        assert_eq!(
            next_action(OrderStatus::Created, &order, None, 0, &policy),
            SwapAction::Initiate
        );
        assert_eq!(
            next_action(OrderStatus::Expired, &order, None, 0, &policy),
            SwapAction::Refund
        );
    }
}
