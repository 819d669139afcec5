//! Hashlock swap orchestration on top of `swap_client`.
//!
//! [`orchestrator::Garden`] submits orders and runs the execute loop; each
//! tracked order is advanced by [`driver::step`], which classifies the order
//! with [`state::classify`] and performs at most one chain action through a
//! [`wallet::ChainWallet`].

pub mod config;
pub mod driver;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod state;
pub mod wallet;

pub use events::SwapEvent;
pub use orchestrator::{Garden, GardenConfig, TrackedOrders};
pub use state::{OrderStatus, SwapAction};
