use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;

use crate::types::{Result, SwapError};

/// Signing capability of the user's EVM wallet.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Checksummed address of the signing key.
    fn address(&self) -> String;

    /// EIP-191 personal-message signature (`r || s || v`).
    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Signature over a precomputed digest, used for EIP-712 payloads.
    async fn sign_digest(&self, digest: [u8; 32]) -> Result<Vec<u8>>;
}

/// In-process signer backed by a raw secp256k1 key.
#[derive(Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// Accepts the key with or without the `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let inner = key
            .parse::<PrivateKeySigner>()
            .map_err(|_| SwapError::Configuration("invalid EVM private key".to_string()))?;
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &PrivateKeySigner {
        &self.inner
    }
}

#[async_trait]
impl MessageSigner for LocalSigner {
    fn address(&self) -> String {
        self.inner.address().to_checksum(None)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .inner
            .sign_message(message)
            .await
            .map_err(|err| SwapError::Auth(format!("message signing failed: {err}")))?;
        Ok(signature.as_bytes().to_vec())
    }

    async fn sign_digest(&self, digest: [u8; 32]) -> Result<Vec<u8>> {
        let signature = self
            .inner
            .sign_hash(&B256::from(digest))
            .await
            .map_err(|err| SwapError::Auth(format!("digest signing failed: {err}")))?;
        Ok(signature.as_bytes().to_vec())
    }
}
