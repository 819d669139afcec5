use std::time::Duration;

use tracing::info;

use crate::state::OrderStatus;

pub trait SwapMetrics: Send + Sync {
    fn record_transition(&self, order_id: &str, from: Option<OrderStatus>, to: OrderStatus);
    fn record_latency(&self, stage: &'static str, elapsed: Duration);
}

#[derive(Default, Debug, Clone)]
pub struct NoopMetrics;

impl SwapMetrics for NoopMetrics {
    fn record_transition(&self, _order_id: &str, _from: Option<OrderStatus>, _to: OrderStatus) {}
    fn record_latency(&self, _stage: &'static str, _elapsed: Duration) {}
}

/// Emits metrics as structured `tracing` events under the `metrics` target.
#[derive(Default, Debug, Clone)]
pub struct TracingMetrics;

impl SwapMetrics for TracingMetrics {
    fn record_transition(&self, order_id: &str, from: Option<OrderStatus>, to: OrderStatus) {
        info!(
            target: "metrics",
            order_id,
            from = from.map_or("none", |status| status.as_str()),
            to = to.as_str(),
            "transition"
        );
    }

    fn record_latency(&self, stage: &'static str, elapsed: Duration) {
        info!(
            target: "metrics",
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "latency"
        );
    }
}
