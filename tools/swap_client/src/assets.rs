//! Chains, assets and order pairs.
//!
//! An asset is identified by its chain and the address of the HTLC contract
//! that escrows it; native bitcoin uses the `primary` marker instead of an
//! address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Result, SwapError};

pub const NATIVE_MARKER: &str = "primary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Bitcoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Bitcoin,
    BitcoinTestnet,
    BitcoinRegtest,
    Ethereum,
    EthereumSepolia,
    EthereumLocalnet,
    Arbitrum,
    ArbitrumSepolia,
    ArbitrumLocalnet,
}

impl Chain {
    pub const ALL: [Chain; 9] = [
        Chain::Bitcoin,
        Chain::BitcoinTestnet,
        Chain::BitcoinRegtest,
        Chain::Ethereum,
        Chain::EthereumSepolia,
        Chain::EthereumLocalnet,
        Chain::Arbitrum,
        Chain::ArbitrumSepolia,
        Chain::ArbitrumLocalnet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::BitcoinTestnet => "bitcoin_testnet",
            Chain::BitcoinRegtest => "bitcoin_regtest",
            Chain::Ethereum => "ethereum",
            Chain::EthereumSepolia => "ethereum_sepolia",
            Chain::EthereumLocalnet => "ethereum_localnet",
            Chain::Arbitrum => "arbitrum",
            Chain::ArbitrumSepolia => "arbitrum_sepolia",
            Chain::ArbitrumLocalnet => "arbitrum_localnet",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Bitcoin | Chain::BitcoinTestnet | Chain::BitcoinRegtest => ChainFamily::Bitcoin,
            _ => ChainFamily::Evm,
        }
    }

    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::EthereumSepolia => Some(11_155_111),
            Chain::EthereumLocalnet => Some(31_337),
            Chain::Arbitrum => Some(42_161),
            Chain::ArbitrumSepolia => Some(421_614),
            Chain::ArbitrumLocalnet => Some(31_338),
            _ => None,
        }
    }

    /// HTLC timelock in blocks used when this chain is the source leg.
    pub fn default_timelock(&self) -> u64 {
        match self.family() {
            ChainFamily::Bitcoin => 288,
            ChainFamily::Evm => 7_200,
        }
    }

    pub fn bitcoin_network(&self) -> Option<bitcoin::Network> {
        match self {
            Chain::Bitcoin => Some(bitcoin::Network::Bitcoin),
            Chain::BitcoinTestnet => Some(bitcoin::Network::Testnet),
            Chain::BitcoinRegtest => Some(bitcoin::Network::Regtest),
            _ => None,
        }
    }

    pub fn is_testnet(&self) -> bool {
        !matches!(self, Chain::Bitcoin | Chain::Ethereum | Chain::Arbitrum)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = SwapError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.as_str() == value)
            .ok_or_else(|| SwapError::Configuration(format!("unsupported chain: {value}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub chain: Chain,
    /// HTLC contract address, or [`NATIVE_MARKER`] for native bitcoin.
    pub atomic_swap_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub decimals: u8,
    pub symbol: String,
}

impl Asset {
    pub fn new(chain: Chain, atomic_swap_address: &str, decimals: u8, symbol: &str) -> Self {
        Self {
            chain,
            atomic_swap_address: atomic_swap_address.to_string(),
            token_address: None,
            decimals,
            symbol: symbol.to_string(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.atomic_swap_address == NATIVE_MARKER
    }

    /// Catalogue key, e.g. `ethereum_sepolia_0x3c6a...` or `bitcoin_testnet_primary`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.chain, self.atomic_swap_address.to_lowercase())
    }

    /// `chain:contract` half of an order pair.
    pub fn route_id(&self) -> String {
        format!("{}:{}", self.chain, self.atomic_swap_address)
    }
}

/// Directed route key `chain:contract::chain:contract`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderPair(String);

impl OrderPair {
    pub fn new(from: &Asset, to: &Asset) -> Self {
        Self(format!("{}::{}", from.route_id(), to.route_id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key back into `(chain, contract)` halves.
    pub fn legs(&self) -> Result<((Chain, String), (Chain, String))> {
        let (from, to) = self
            .0
            .split_once("::")
            .ok_or_else(|| SwapError::Configuration(format!("malformed order pair: {}", self.0)))?;
        Ok((parse_route(from)?, parse_route(to)?))
    }
}

impl fmt::Display for OrderPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderPair {
    type Err = SwapError;

    fn from_str(value: &str) -> Result<Self> {
        let pair = Self(value.trim().to_string());
        pair.legs()?;
        Ok(pair)
    }
}

fn parse_route(value: &str) -> Result<(Chain, String)> {
    let (chain, contract) = value
        .split_once(':')
        .ok_or_else(|| SwapError::Configuration(format!("malformed route: {value}")))?;
    if contract.is_empty() {
        return Err(SwapError::Configuration(format!("route without contract: {value}")));
    }
    Ok((chain.parse()?, contract.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl FromStr for Network {
    type Err = SwapError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            _ => Err(SwapError::Configuration(
                "invalid network (expected mainnet/testnet)".to_string(),
            )),
        }
    }
}

const TESTNET_ASSETS: &[(Chain, &str, u8, &str)] = &[
    (
        Chain::EthereumSepolia,
        "0x3c6a17b8cd92976d1d91e491c93c98cd81998265",
        8,
        "WBTC",
    ),
    (
        Chain::ArbitrumSepolia,
        "0x795dcb58d1cd4789169d5f938ea05e17eceb68ca",
        8,
        "WBTC",
    ),
    (Chain::BitcoinTestnet, NATIVE_MARKER, 8, "BTC"),
];

const MAINNET_ASSETS: &[(Chain, &str, u8, &str)] = &[(Chain::Bitcoin, NATIVE_MARKER, 8, "BTC")];

/// Static asset catalogue per network.
pub struct SupportedAssets;

impl SupportedAssets {
    pub fn all(network: Network) -> Vec<Asset> {
        let table = match network {
            Network::Mainnet => MAINNET_ASSETS,
            Network::Testnet => TESTNET_ASSETS,
        };
        table
            .iter()
            .map(|(chain, address, decimals, symbol)| Asset::new(*chain, address, *decimals, symbol))
            .collect()
    }

    pub fn lookup(network: Network, key: &str) -> Result<Asset> {
        let key = key.trim().to_lowercase();
        Self::all(network)
            .into_iter()
            .find(|asset| asset.key() == key)
            .ok_or_else(|| SwapError::Configuration(format!("unsupported asset: {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_pair_uses_chain_contract_routes() {
        let from = SupportedAssets::lookup(
            Network::Testnet,
            "ethereum_sepolia_0x3c6a17b8cd92976d1d91e491c93c98cd81998265",
        )
        .unwrap();
        let to = SupportedAssets::lookup(Network::Testnet, "bitcoin_testnet_primary").unwrap();
        let pair = OrderPair::new(&from, &to);
        assert_eq!(
            pair.as_str(),
            "ethereum_sepolia:0x3c6a17b8cd92976d1d91e491c93c98cd81998265::bitcoin_testnet:primary"
        );
        let ((src_chain, _), (dst_chain, dst_contract)) = pair.legs().unwrap();
        assert_eq!(src_chain, Chain::EthereumSepolia);
        assert_eq!(dst_chain, Chain::BitcoinTestnet);
        assert_eq!(dst_contract, NATIVE_MARKER);
    }

    #[test]
    fn rejects_malformed_pairs_and_chains() {
        assert!("ethereum_sepolia:0xabc".parse::<OrderPair>().is_err());
        assert!("dogecoin:primary::bitcoin:primary".parse::<OrderPair>().is_err());
        assert!("solana".parse::<Chain>().is_err());
    }
}
