mod common;

use swap_client::WatcherConfig;
use swap_coordinator::driver::{step, StepContext, TrackedOrder};
use swap_coordinator::state::{ActionPolicy, OrderStatus, SwapAction};
use swap_coordinator::wallet::WalletRegistry;

use common::*;

#[tokio::test]
async fn metrics_are_emitted_on_transition() {
    let source = MockWallet::new(SOURCE, 120);
    let destination = MockWallet::new(DESTINATION, 1_000);
    let wallets = WalletRegistry::new()
        .with(source.clone())
        .with(destination.clone());
    let secrets = secrets();
    let metrics = RecordingMetrics::default();
    let policy = ActionPolicy::default();
    let mut tracked = TrackedOrder::new(matched_order("order-1", 1), WatcherConfig::default());

    let ctx = |cycle| StepContext {
        wallets: &wallets,
        secrets: &secrets,
        metrics: &metrics,
        policy: &policy,
        cycle,
        now: 0,
    };

    let outcome = step(&mut tracked, &ctx(0)).await.unwrap();
    assert_eq!(outcome.status, OrderStatus::Created);
    assert_eq!(outcome.action, SwapAction::Idle);

    tracked.refresh(redeemable_order("order-1", 1));
    let outcome = step(&mut tracked, &ctx(1)).await.unwrap();
    assert_eq!(outcome.status, OrderStatus::Redeemable);
    assert_eq!(outcome.action, SwapAction::Redeem);
    assert!(outcome.tx_hash.is_some());

    // Same status again: no transition, no action.
    let outcome = step(&mut tracked, &ctx(2)).await.unwrap();
    assert_eq!(outcome.action, SwapAction::Idle);

    let transitions = metrics.transitions.lock().unwrap();
    assert_eq!(
        transitions.as_slice(),
        &[
            ("none".to_string(), "created".to_string()),
            ("created".to_string(), "redeemable".to_string()),
        ]
    );
    let latencies = metrics.latencies.lock().unwrap();
    assert_eq!(latencies.as_slice(), &["redeem"]);
}

#[tokio::test]
async fn missing_wallet_fails_the_step() {
    let wallets = WalletRegistry::new().with(MockWallet::new(SOURCE, 120));
    let secrets = secrets();
    let metrics = RecordingMetrics::default();
    let policy = ActionPolicy::default();
    let mut tracked = TrackedOrder::new(matched_order("order-2", 1), WatcherConfig::default());
    let ctx = StepContext {
        wallets: &wallets,
        secrets: &secrets,
        metrics: &metrics,
        policy: &policy,
        cycle: 0,
        now: 0,
    };

    let err = step(&mut tracked, &ctx).await.unwrap_err();
    assert!(err.to_string().contains("no wallet configured"));
    assert!(metrics.transitions.lock().unwrap().is_empty());
}
