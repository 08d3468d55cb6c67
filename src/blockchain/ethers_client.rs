// src/blockchain/ethers_client.rs
//! Ledger client backed by an ethers JSON-RPC provider.
//!
//! Provides the identity token operations (reservation, minting, lookup)
//! and message signing through a local wallet, with a fallback to the
//! node's `personal_sign` for addresses the wallet does not hold.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    abi::parse_abi,
    contract::Contract,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, Signature, U256},
};

use crate::blockchain::ledger::Ledger;
use crate::config::Settings;
use crate::error::{IdentityError, Result};

/// Human-readable ABI of the identity token contract: reservation and
/// minting on top of ERC-721 enumerable lookups.
pub const IDENTITY_TOKEN_ABI: &[&str] = &[
    "function reserveTokenId() returns (uint256)",
    "function mintReserved(address to, uint256 tokenId, string uri)",
    "function balanceOf(address owner) view returns (uint256)",
    "function tokenOfOwnerByIndex(address owner, uint256 index) view returns (uint256)",
    "function tokenURI(uint256 tokenId) view returns (string)",
];

type SignerClient = SignerMiddleware<Arc<Provider<Http>>, LocalWallet>;

/// Ledger client for the identity token contract.
///
/// This client provides:
/// - Local wallet signing for the configured main address
/// - Contract transactions for token reservation and minting
/// - Read-only token lookups
#[derive(Clone)]
pub struct EthersLedger {
    /// JSON-RPC provider, used for node-side signing
    provider: Arc<Provider<Http>>,
    /// Provider wrapped with the local wallet
    client: Arc<SignerClient>,
    /// Identity token contract bound to `client`
    contract: Contract<SignerClient>,
}

impl EthersLedger {
    /// Connects to the ledger described by `settings`.
    ///
    /// # Errors
    /// Returns error if:
    /// - RPC URL or contract address is invalid
    /// - Private key is missing or invalid
    /// - Chain ID cannot be retrieved
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let provider = Arc::new(
            Provider::<Http>::try_from(settings.rpc_url.as_str())
                .map_err(|e| IdentityError::InvalidArgument(format!("Invalid RPC URL: {}", e)))?,
        );

        let chain_id = match settings.network_id {
            Some(id) => id,
            None => provider
                .get_chainid()
                .await
                .map_err(anyhow::Error::from)?
                .as_u64(),
        };

        let private_key = settings
            .private_key
            .as_deref()
            .ok_or_else(|| IdentityError::MissingKey("IID_PRIVATE_KEY must be set".into()))?;
        let wallet = private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?
            .with_chain_id(chain_id);

        let contract_address: Address = settings
            .contract_address
            .parse()
            .map_err(|e| IdentityError::InvalidArgument(format!("Invalid contract address: {}", e)))?;
        let abi = parse_abi(IDENTITY_TOKEN_ABI)
            .map_err(|e| IdentityError::InvalidArgument(format!("Invalid contract ABI: {}", e)))?;

        log::info!(
            "connected to chain {} as {:?}, identity contract {:?}",
            chain_id,
            wallet.address(),
            contract_address
        );
        let client = Arc::new(SignerMiddleware::new(provider.clone(), wallet));
        let contract = Contract::new(contract_address, abi, client.clone());

        Ok(Self {
            provider,
            client,
            contract,
        })
    }

    /// Address of the local wallet.
    pub fn wallet_address(&self) -> Address {
        self.client.signer().address()
    }
}

#[async_trait]
impl Ledger for EthersLedger {
    fn contract_address(&self) -> Address {
        self.contract.address()
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.client.get_chainid().await?.as_u64())
    }

    async fn reserve_token_id(&self, owner: Address) -> anyhow::Result<U256> {
        let call = self
            .contract
            .method::<_, U256>("reserveTokenId", ())?
            .from(owner);
        // Simulate first to learn the id the transaction will reserve.
        let token_id = call.call().await?;
        let pending = call.send().await?;
        let receipt = pending.await?;
        log::info!(
            "reserved token {} (tx {:?})",
            token_id,
            receipt.map(|r| r.transaction_hash)
        );
        Ok(token_id)
    }

    async fn mint_reserved(&self, owner: Address, token_id: U256, recipient: Address, uri: &str) -> anyhow::Result<()> {
        let call = self
            .contract
            .method::<_, ()>("mintReserved", (recipient, token_id, uri.to_string()))?
            .from(owner);
        let pending = call.send().await?;
        let receipt = pending
            .await?
            .ok_or_else(|| anyhow::anyhow!("mint transaction for token {} was dropped", token_id))?;
        log::info!(
            "minted token {} to {:?} (tx {:?})",
            token_id,
            recipient,
            receipt.transaction_hash
        );
        Ok(())
    }

    async fn sign_personal(&self, payload: &str, address: Address) -> anyhow::Result<Signature> {
        if address == self.wallet_address() {
            return Ok(self.client.signer().sign_message(payload).await?);
        }
        let raw: String = self
            .provider
            .request(
                "personal_sign",
                (Bytes::from(payload.as_bytes().to_vec()), address),
            )
            .await?;
        Ok(raw.parse::<Signature>()?)
    }

    async fn sign(&self, payload: &str, address: Address) -> anyhow::Result<Signature> {
        Ok(self
            .client
            .sign(payload.as_bytes().to_vec(), &address)
            .await?)
    }

    async fn last_token_of(&self, owner: Address) -> anyhow::Result<U256> {
        let balance: U256 = self
            .contract
            .method::<_, U256>("balanceOf", owner)?
            .call()
            .await?;
        if balance.is_zero() {
            anyhow::bail!("no identity token issued to {:?}", owner);
        }
        let token_id = self
            .contract
            .method::<_, U256>("tokenOfOwnerByIndex", (owner, balance - 1))?
            .call()
            .await?;
        Ok(token_id)
    }

    async fn token_uri(&self, token_id: U256) -> anyhow::Result<String> {
        let uri = self
            .contract
            .method::<_, String>("tokenURI", token_id)?
            .call()
            .await?;
        Ok(uri)
    }
}
