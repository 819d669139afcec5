//! Key material for hashlock swaps.
//!
//! Auditor notes:
//! - The master secret never leaves `SecretManager` except through
//!   `master_priv_key`, which seeds the bitcoin key.
//! - Order secrets are pure functions of (master, index); nothing is persisted.

mod secrets;
mod signer;

pub use secrets::{derive_order_secret, MasterSecret, OrderSecret, SecretManager, MASTER_CHALLENGE};
pub use signer::{LocalSigner, MessageSigner};
