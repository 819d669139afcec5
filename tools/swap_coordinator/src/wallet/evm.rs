use std::str::FromStr;

use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use swap_client::{
    parse_amount, Asset, Chain, ChainActionError, ChainFamily, EvmInitiator, LocalSigner,
    MatchedOrder, MessageSigner, OrderSecret, Result, SwapError,
};
use tracing::{debug, info};

use super::ChainWallet;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface IHTLC {
        function token() external view returns (address);
        function initiate(address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash) external;
        function redeem(bytes32 orderID, bytes calldata secret) external;
        function refund(bytes32 orderID) external;
    }
}

/// Local-key wallet for one EVM chain.
pub struct EvmWallet {
    chain: Chain,
    signer: LocalSigner,
    provider: DynProvider,
}

impl EvmWallet {
    pub fn connect(chain: Chain, rpc_url: &str, signer: LocalSigner) -> Result<Self> {
        if chain.family() != ChainFamily::Evm {
            return Err(SwapError::Configuration(format!("{chain} is not an EVM chain")));
        }
        let url = rpc_url
            .parse()
            .map_err(|err| SwapError::Configuration(format!("EVM rpc url {rpc_url}: {err}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.inner().clone()))
            .connect_http(url)
            .erased();
        Ok(Self {
            chain,
            signer,
            provider,
        })
    }

    fn owner(&self) -> Address {
        self.signer.inner().address()
    }

    /// Gas token balance in wei.
    pub async fn native_balance(&self) -> Result<U256> {
        self.provider
            .get_balance(self.owner())
            .await
            .map_err(rpc_error)
    }

    async fn token_for(&self, asset: &Asset) -> Result<Address> {
        match asset.token_address.as_deref() {
            Some(token) => parse_address("token", token),
            None => self.htlc_token(parse_address("HTLC", &asset.atomic_swap_address)?).await,
        }
    }

    async fn settle(
        &self,
        label: &str,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<String> {
        let tx_hash = pending.tx_hash().to_string();
        debug!(chain = %self.chain, %tx_hash, "Waiting for {label} receipt");
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|err| ChainActionError::classify(err.to_string()))?;
        if !receipt.status() {
            return Err(ChainActionError::Rejected(format!("{label} {tx_hash} reverted")).into());
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl ChainWallet for EvmWallet {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn address(&self) -> String {
        self.signer.address()
    }

    async fn balance(&self, asset: &Asset) -> Result<U256> {
        let token = self.token_for(asset).await?;
        self.token_balance(token).await
    }

    async fn block_height(&self) -> Result<u64> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn initiate(&self, order: &MatchedOrder) -> Result<String> {
        let leg = &order.source_swap;
        let htlc = parse_address("HTLC", &leg.asset)?;
        let amount = parse_amount(&leg.amount)?;
        let token = self.htlc_token(htlc).await?;
        if self.allowance(token, htlc).await? < amount {
            self.approve(token, htlc, U256::MAX).await?;
        }
        let contract = IHTLC::new(htlc, self.provider.clone());
        let pending = contract
            .initiate(
                parse_address("redeemer", &leg.redeemer)?,
                U256::from(leg.timelock),
                amount,
                parse_b256("secret hash", &leg.secret_hash)?,
            )
            .send()
            .await
            .map_err(|err| ChainActionError::classify(err.to_string()))?;
        let tx_hash = self.settle("initiate", pending).await?;
        info!(order_id = order.id(), %tx_hash, "Initiated source leg");
        Ok(tx_hash)
    }

    async fn redeem(&self, order: &MatchedOrder, secret: &OrderSecret) -> Result<String> {
        let leg = &order.destination_swap;
        let contract = IHTLC::new(parse_address("HTLC", &leg.asset)?, self.provider.clone());
        let pending = contract
            .redeem(
                parse_b256("swap id", &leg.swap_id)?,
                Bytes::copy_from_slice(secret.secret()),
            )
            .send()
            .await
            .map_err(|err| ChainActionError::classify(err.to_string()))?;
        self.settle("redeem", pending).await
    }

    async fn refund(&self, order: &MatchedOrder) -> Result<String> {
        let leg = &order.source_swap;
        let contract = IHTLC::new(parse_address("HTLC", &leg.asset)?, self.provider.clone());
        let pending = contract
            .refund(parse_b256("swap id", &leg.swap_id)?)
            .send()
            .await
            .map_err(|err| ChainActionError::classify(err.to_string()))?;
        self.settle("refund", pending).await
    }
}

#[async_trait]
impl EvmInitiator for EvmWallet {
    fn address(&self) -> String {
        self.signer.address()
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn htlc_token(&self, htlc: Address) -> Result<Address> {
        IHTLC::new(htlc, self.provider.clone())
            .token()
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(self.owner())
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256> {
        IERC20::new(token, self.provider.clone())
            .allowance(self.owner(), spender)
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<String> {
        let pending = IERC20::new(token, self.provider.clone())
            .approve(spender, amount)
            .send()
            .await
            .map_err(|err| ChainActionError::Rejected(err.to_string()))?;
        self.settle("approve", pending).await
    }

    async fn sign_digest(&self, digest: B256) -> Result<Vec<u8>> {
        self.signer.sign_digest(digest.0).await
    }
}

fn rpc_error(err: impl std::fmt::Display) -> SwapError {
    SwapError::Transient(format!("evm rpc: {err}"))
}

fn parse_address(label: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|err| SwapError::Validation(format!("invalid {label} address {value}: {err}")))
}

fn parse_b256(label: &str, value: &str) -> Result<B256> {
    B256::from_str(value.trim())
        .map_err(|err| SwapError::Validation(format!("invalid {label} {value}: {err}")))
}
