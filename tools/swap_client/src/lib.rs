//! Client side of cross-chain HTLC swaps against the Garden services.
//!
//! Auditor notes:
//! - Secret derivation is isolated under `crypto/`; order secrets are never
//!   persisted and only leave the process through `RelayClient::redeem` or a
//!   chain wallet's redeem.
//! - Every HTTP call goes through `rpc::ApiClient`, which owns timeouts and
//!   retries. POSTs are never retried.

pub mod assets;
pub mod auth;
pub mod crypto;
pub mod orderbook;
pub mod orders;
pub mod quote;
pub mod relay;
pub mod rpc;
pub mod types;
pub mod watcher;

pub use assets::{Asset, Chain, ChainFamily, Network, OrderPair, SupportedAssets, NATIVE_MARKER};
pub use auth::{
    token_is_fresh, Authenticator, JsonFileStore, MemoryStore, OrderAuth, StaticToken, TokenStore,
};
pub use crypto::{
    derive_order_secret, LocalSigner, MasterSecret, MessageSigner, OrderSecret, SecretManager,
    MASTER_CHALLENGE,
};
pub use orderbook::{Orderbook, OrderbookClient};
pub use orders::{
    parse_amount, AdditionalSwapData, CreateOrder, CreateOrderRequest, MatchedOrder,
    OrderAdditionalData, SwapLeg, SwapParams,
};
pub use quote::{Attestation, Quote, QuoteClient, QuoteProvider, QuoteSelection};
pub use relay::{initiate_digest, EvmInitiator, InitiateRequest, PerformOn, RelayClient};
pub use rpc::{ApiClient, RetryConfig};
pub use types::{ChainActionError, Result, SwapError};
pub use watcher::{LegWatcher, WatcherConfig, WatcherEvent, WatcherState};
