//! Sign-In-With-Ethereum session for the orderbook and relayer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crypto::MessageSigner;
use crate::rpc::{ApiClient, RetryConfig};
use crate::types::{Result, SwapError};

/// Bearer token source for authenticated orderbook calls.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// Fixed token, for callers that obtained a session elsewhere.
pub struct StaticToken(pub String);

#[async_trait]
impl Authenticator for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub trait TokenStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, token: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl TokenStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|_| SwapError::Auth("token store poisoned".to_string()))?;
        Ok(tokens.get(key).cloned())
    }

    fn save(&self, key: &str, token: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| SwapError::Auth("token store poisoned".to_string()))?;
        tokens.insert(key.to_string(), token.to_string());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

/// One `<key>.json` file per identity under `base_dir`.
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(|err| {
            SwapError::Configuration(format!("create token directory {base_dir:?}: {err}"))
        })?;
        Ok(Self { base_dir })
    }

    fn token_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{name}.json"))
    }
}

impl TokenStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.token_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|err| SwapError::Auth(format!("read token file {path:?}: {err}")))?;
        let stored: StoredToken = serde_json::from_str(&json)
            .map_err(|err| SwapError::Auth(format!("parse token file {path:?}: {err}")))?;
        Ok(Some(stored.token))
    }

    fn save(&self, key: &str, token: &str) -> Result<()> {
        let path = self.token_path(key);
        let json = serde_json::to_string_pretty(&StoredToken {
            token: token.to_string(),
        })?;
        fs::write(&path, json)
            .map_err(|err| SwapError::Auth(format!("write token file {path:?}: {err}")))
    }
}

/// True when the JWT carries an `exp` further away than `skew`.
pub fn token_is_fresh(token: &str, skew: Duration) -> bool {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let Some(payload) = token.split('.').nth(1) else {
        return false;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return false;
    };
    let Ok(claims) = serde_json::from_slice::<Claims>(&bytes) else {
        return false;
    };
    claims.exp > Utc::now().timestamp() + skew.as_secs() as i64
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    message: &'a str,
    signature: String,
    nonce: &'a str,
}

pub struct OrderAuth {
    api: ApiClient,
    signer: Arc<dyn MessageSigner>,
    store: Box<dyn TokenStore>,
    chain_id: u64,
    skew: Duration,
    login: tokio::sync::Mutex<()>,
}

impl OrderAuth {
    pub fn new(
        orderbook_url: &str,
        signer: Arc<dyn MessageSigner>,
        chain_id: u64,
        retry: RetryConfig,
    ) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("auth", orderbook_url, retry)?,
            signer,
            store: Box::new(MemoryStore::default()),
            chain_id,
            skew: Duration::from_secs(60),
            login: tokio::sync::Mutex::new(()),
        })
    }

    pub fn with_store(mut self, store: Box<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    /// EIP-4361 message for `nonce`.
    pub fn siwe_message(&self, nonce: &str) -> String {
        let base = self.api.base_url();
        let domain = base.host_str().unwrap_or("localhost");
        format!(
            "{domain} wants you to sign in with your Ethereum account:\n{address}\n\nGarden.fi\n\nURI: {uri}\nVersion: 1\nChain ID: {chain_id}\nNonce: {nonce}\nIssued At: {issued_at}",
            address = self.signer.address(),
            uri = base.as_str().trim_end_matches('/'),
            chain_id = self.chain_id,
            issued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    async fn login(&self) -> Result<String> {
        let nonce: String = self
            .api
            .get("auth/siwe/challenges", None)
            .await
            .map_err(auth_failure)?;
        let message = self.siwe_message(&nonce);
        let signature = self.signer.sign_message(message.as_bytes()).await?;
        let token: String = self
            .api
            .post(
                "auth/verify",
                &VerifyRequest {
                    message: &message,
                    signature: format!("0x{}", hex::encode(signature)),
                    nonce: &nonce,
                },
                None,
            )
            .await
            .map_err(auth_failure)?;
        if token.trim().is_empty() {
            return Err(SwapError::Auth("orderbook issued an empty token".to_string()));
        }
        Ok(token)
    }
}

#[async_trait]
impl Authenticator for OrderAuth {
    async fn token(&self) -> Result<String> {
        let _guard = self.login.lock().await;
        let key = self.signer.address().to_lowercase();
        if let Some(token) = self.store.load(&key)? {
            if token_is_fresh(&token, self.skew) {
                return Ok(token);
            }
            debug!(address = %key, "Cached session expired");
        }
        let token = self.login().await?;
        self.store.save(&key, &token)?;
        info!(address = %key, "Authenticated with orderbook");
        Ok(token)
    }
}

fn auth_failure(err: SwapError) -> SwapError {
    match err {
        SwapError::Transient(_) | SwapError::Auth(_) => err,
        other => SwapError::Auth(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"0xabc","exp":{exp}}}"#));
        format!("e30.{payload}.sig")
    }

    #[test]
    fn freshness_honours_skew() {
        let now = Utc::now().timestamp();
        assert!(token_is_fresh(&jwt(now + 3_600), Duration::from_secs(60)));
        assert!(!token_is_fresh(&jwt(now + 30), Duration::from_secs(60)));
        assert!(!token_is_fresh("opaque-token", Duration::from_secs(60)));
    }

    #[test]
    fn memory_store_round_trips_per_key() {
        let store = MemoryStore::default();
        assert_eq!(store.load("0xabc").unwrap(), None);
        store.save("0xabc", "t1").unwrap();
        assert_eq!(store.load("0xabc").unwrap().as_deref(), Some("t1"));
        assert_eq!(store.load("0xdef").unwrap(), None);
    }
}
