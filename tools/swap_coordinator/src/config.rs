use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::U256;
use anyhow::{anyhow, bail, Context, Result};
use swap_client::{Chain, ChainFamily, RetryConfig};

use crate::orchestrator::GardenConfig;

pub fn validate_url(label: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{label} must start with http:// or https://"))
    }
}

pub fn validate_nonzero(label: &str, value: u64) -> Result<()> {
    if value == 0 {
        Err(anyhow!("{label} must be greater than zero"))
    } else {
        Ok(())
    }
}

/// Accepts a 32-byte hex key with or without `0x` and returns it prefixed.
pub fn normalize_private_key(value: &str) -> Result<String> {
    let trimmed = value.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if bare.len() != 64 || !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("private key must be 32 bytes of hex");
    }
    Ok(format!("0x{bare}"))
}

/// Parses a decimal ether amount such as `0.02` into wei.
pub fn parse_gas_balance(value: &str) -> Result<U256> {
    parse_ether(value.trim()).with_context(|| format!("invalid ether amount {value}"))
}

/// Startup configuration, validated once and immutable afterwards.
#[derive(Debug, Clone)]
pub struct SwapConfig {
    pub private_key: String,
    pub orderbook_url: String,
    pub quote_url: String,
    pub evm_chain: Chain,
    pub evm_rpc_url: String,
    pub bitcoin_chain: Chain,
    pub bitcoin_explorer_url: String,
    pub poll_interval_secs: u64,
    pub match_timeout_secs: u64,
    /// Native gas balance required before any swap, in wei.
    pub min_gas_balance: U256,
    /// Where SIWE tokens are cached between runs; in memory when unset.
    pub token_dir: Option<PathBuf>,
    /// Lock the source leg from our own wallet when the relayer has not.
    pub initiate_on_chain: bool,
    pub retry: RetryConfig,
}

impl SwapConfig {
    pub fn validate(&self) -> Result<()> {
        normalize_private_key(&self.private_key)?;
        validate_url("orderbook url", &self.orderbook_url)?;
        validate_url("quote url", &self.quote_url)?;
        validate_url("EVM rpc url", &self.evm_rpc_url)?;
        validate_url("bitcoin explorer url", &self.bitcoin_explorer_url)?;
        validate_nonzero("poll interval", self.poll_interval_secs)?;
        validate_nonzero("match timeout", self.match_timeout_secs)?;
        if self.evm_chain.family() != ChainFamily::Evm {
            bail!("{} is not an EVM chain", self.evm_chain);
        }
        if self.bitcoin_chain.family() != ChainFamily::Bitcoin {
            bail!("{} is not a bitcoin chain", self.bitcoin_chain);
        }
        if self.evm_chain.is_testnet() != self.bitcoin_chain.is_testnet() {
            bail!(
                "{} and {} are on different networks",
                self.evm_chain,
                self.bitcoin_chain
            );
        }
        Ok(())
    }

    pub fn evm_chain_id(&self) -> Result<u64> {
        self.evm_chain
            .evm_chain_id()
            .ok_or_else(|| anyhow!("{} has no chain id", self.evm_chain))
    }

    pub fn garden_config(&self) -> GardenConfig {
        let mut garden = GardenConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            match_timeout: Duration::from_secs(self.match_timeout_secs),
            ..GardenConfig::default()
        };
        garden.policy.initiate_on_chain = self.initiate_on_chain;
        garden
    }
}
