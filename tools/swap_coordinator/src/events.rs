use std::sync::Arc;

use swap_client::{MatchedOrder, SwapError};

use crate::state::SwapAction;

/// Lifecycle notifications published by the execute loop.
#[derive(Debug, Clone)]
pub enum SwapEvent {
    Success {
        order: Box<MatchedOrder>,
        action: SwapAction,
        tx_hash: String,
    },
    Error {
        order: Box<MatchedOrder>,
        error: Arc<SwapError>,
    },
}

impl SwapEvent {
    pub fn order_id(&self) -> &str {
        match self {
            Self::Success { order, .. } | Self::Error { order, .. } => order.id(),
        }
    }
}
