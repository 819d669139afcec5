//! Orderbook: order creation, matched-order lookups and per-user listings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::orders::{CreateOrderRequest, MatchedOrder};
use crate::rpc::{ApiClient, Paginated, RetryConfig};
use crate::types::{Result, SwapError};

const PAGE_SIZE: u64 = 100;

#[async_trait]
pub trait Orderbook: Send + Sync {
    /// Submits an attested order and returns its id. Never retried.
    async fn create_order(&self, order: &CreateOrderRequest) -> Result<String>;

    /// `None` until the orderbook has matched the order with a solver.
    async fn get_order(&self, id: &str) -> Result<Option<MatchedOrder>>;

    /// Matched orders of `address` that are not yet settled.
    async fn pending_orders(&self, address: &str) -> Result<Vec<MatchedOrder>>;

    /// Number of orders ever created by `address`.
    async fn orders_count(&self, address: &str) -> Result<u64>;

    /// Polls [`Orderbook::get_order`] until matched, tolerating transient failures.
    async fn wait_for_match(
        &self,
        id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<MatchedOrder> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.get_order(id).await {
                Ok(Some(order)) => return Ok(order),
                Ok(None) => debug!(order_id = id, "Order not matched yet"),
                Err(err) if err.is_transient() => {
                    warn!(order_id = id, error = %err, "Match lookup failed; will poll again")
                }
                Err(err) => return Err(err),
            }
            if Instant::now() + interval > deadline {
                return Err(SwapError::Transient(format!(
                    "order {id} was not matched within {}s",
                    timeout.as_secs()
                )));
            }
            sleep(interval).await;
        }
    }
}

pub struct OrderbookClient {
    api: ApiClient,
    auth: Arc<dyn Authenticator>,
}

impl OrderbookClient {
    pub fn new(base_url: &str, auth: Arc<dyn Authenticator>, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("orderbook", base_url, retry)?,
            auth,
        })
    }
}

#[async_trait]
impl Orderbook for OrderbookClient {
    async fn create_order(&self, order: &CreateOrderRequest) -> Result<String> {
        let token = self.auth.token().await?;
        let id: String = self
            .api
            .post("relayer/create-order", order, Some(&token))
            .await?;
        info!(order_id = %id, nonce = %order.nonce, "Order created");
        Ok(id)
    }

    async fn get_order(&self, id: &str) -> Result<Option<MatchedOrder>> {
        self.api
            .get_optional(&format!("orders/id/matched/{id}"), None)
            .await
    }

    async fn pending_orders(&self, address: &str) -> Result<Vec<MatchedOrder>> {
        let mut orders = Vec::new();
        let mut page = 1;
        loop {
            let batch: Paginated<MatchedOrder> = self
                .api
                .get(
                    &format!(
                        "orders/user/matched/{address}?pending=true&page={page}&per_page={PAGE_SIZE}"
                    ),
                    None,
                )
                .await?;
            let received = batch.data.len();
            orders.extend(batch.data);
            if received == 0 || page >= batch.total_pages {
                break;
            }
            page += 1;
        }
        Ok(orders)
    }

    async fn orders_count(&self, address: &str) -> Result<u64> {
        self.api
            .get(&format!("orders/user/count/{address}"), None)
            .await
    }
}
