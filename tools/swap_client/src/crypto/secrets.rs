use std::fmt;

use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, CompressedPublicKey, PrivateKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::signer::MessageSigner;
use crate::types::{Result, SwapError};

/// Fixed challenge signed once per wallet to seed the master secret.
pub const MASTER_CHALLENGE: &str =
    "Garden.fi\nInitialize your GardenFinance wallet.\nVersion: 1\nNonce: 1";

const ORDER_SECRET_DOMAIN: &[u8] = b"garden/order-secret/v1";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; 32]);

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// sha256 of the wallet's signature over [`MASTER_CHALLENGE`].
    pub fn from_signature(signature: &[u8]) -> Self {
        Self(Sha256::digest(signature).into())
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct OrderSecret {
    secret: [u8; 32],
    hash: [u8; 32],
}

impl OrderSecret {
    pub fn secret(&self) -> &[u8; 32] {
        &self.secret
    }

    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Compares against a hash as rendered by the orderbook (any case, optional `0x`).
    pub fn matches_hash(&self, committed: &str) -> bool {
        let committed = committed.trim();
        let committed = committed.strip_prefix("0x").unwrap_or(committed);
        hex::decode(committed).map_or(false, |bytes| bytes.as_slice() == self.hash.as_slice())
    }
}

impl fmt::Debug for OrderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderSecret")
            .field("secret", &"<redacted>")
            .field("hash", &self.hash_hex())
            .finish()
    }
}

/// HMAC-SHA256(master, domain || index); the commitment is sha256(secret).
pub fn derive_order_secret(master: &MasterSecret, index: u64) -> Result<OrderSecret> {
    let mut mac = HmacSha256::new_from_slice(&master.0)
        .map_err(|err| SwapError::Configuration(format!("order secret key: {err}")))?;
    mac.update(ORDER_SECRET_DOMAIN);
    mac.update(&index.to_be_bytes());
    let secret: [u8; 32] = mac.finalize().into_bytes().into();
    let hash: [u8; 32] = Sha256::digest(secret).into();
    Ok(OrderSecret { secret, hash })
}

pub struct SecretManager {
    master: MasterSecret,
}

impl SecretManager {
    /// Performs the single signing challenge and caches the result.
    pub async fn from_signer(signer: &dyn MessageSigner) -> Result<Self> {
        debug!(address = %signer.address(), "Deriving master secret");
        let signature = signer
            .sign_message(MASTER_CHALLENGE.as_bytes())
            .await
            .map_err(|err| match err {
                SwapError::Auth(message) => SwapError::Auth(message),
                other => SwapError::Auth(format!("master challenge rejected: {other}")),
            })?;
        if signature.is_empty() {
            return Err(SwapError::Auth("signer returned an empty signature".to_string()));
        }
        Ok(Self::from_master(MasterSecret::from_signature(&signature)))
    }

    pub fn from_master(master: MasterSecret) -> Self {
        Self { master }
    }

    pub fn derive_order_secret(&self, index: u64) -> Result<OrderSecret> {
        derive_order_secret(&self.master, index)
    }

    /// Hex master key for seeding the bitcoin signing key.
    pub fn master_priv_key(&self) -> String {
        hex::encode(self.master.0)
    }

    /// P2WPKH address controlled by the master key.
    pub fn bitcoin_address(&self, network: bitcoin::Network) -> Result<String> {
        let public = self.bitcoin_public_key(network)?;
        Ok(Address::p2wpkh(&public, network).to_string())
    }

    /// x-only key used as the user's identity in bitcoin HTLC scripts.
    pub fn bitcoin_x_only_key(&self, network: bitcoin::Network) -> Result<String> {
        let public = self.bitcoin_public_key(network)?;
        Ok(public.0.x_only_public_key().0.to_string())
    }

    fn bitcoin_public_key(&self, network: bitcoin::Network) -> Result<CompressedPublicKey> {
        let secp = Secp256k1::new();
        let key = PrivateKey::from_slice(&self.master.0, network).map_err(|err| {
            SwapError::Configuration(format!("master key is not a valid secp256k1 key: {err}"))
        })?;
        CompressedPublicKey::from_private_key(&secp, &key)
            .map_err(|err| SwapError::Configuration(format!("derive bitcoin public key: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_of_secret() {
        let secret = derive_order_secret(&MasterSecret::from_bytes([9u8; 32]), 3).unwrap();
        let expected: [u8; 32] = Sha256::digest(secret.secret()).into();
        assert_eq!(secret.hash(), expected);
        assert!(secret.matches_hash(&format!("0x{}", secret.hash_hex().to_uppercase())));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let secret = derive_order_secret(&MasterSecret::from_bytes([1u8; 32]), 1).unwrap();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains(&secret.secret_hex()));
        assert!(rendered.contains(&secret.hash_hex()));
    }
}
