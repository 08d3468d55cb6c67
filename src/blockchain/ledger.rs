// src/blockchain/ledger.rs
//! Contract between the identity lifecycle and the ledger that holds
//! identity tokens.

use async_trait::async_trait;
use ethers::types::{Address, Signature, U256};

/// Operations the identity lifecycle needs from a ledger provider.
///
/// Implementations report their own failures through `anyhow`; callers
/// pass them on unchanged.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the identity token contract.
    fn contract_address(&self) -> Address;

    /// Chain id of the network the provider operates on.
    async fn chain_id(&self) -> anyhow::Result<u64>;

    /// Reserves a fresh token id on behalf of `owner`.
    async fn reserve_token_id(&self, owner: Address) -> anyhow::Result<U256>;

    /// Issues the reserved token to `recipient` with the given token URI.
    async fn mint_reserved(&self, owner: Address, token_id: U256, recipient: Address, uri: &str) -> anyhow::Result<()>;

    /// Signs `payload` with the personal-message convention (`personal_sign`).
    async fn sign_personal(&self, payload: &str, address: Address) -> anyhow::Result<Signature>;

    /// Signs `payload` with `eth_sign`.
    async fn sign(&self, payload: &str, address: Address) -> anyhow::Result<Signature>;

    /// Last identity token issued to `owner`.
    async fn last_token_of(&self, owner: Address) -> anyhow::Result<U256>;

    /// URI stored for `token_id`.
    async fn token_uri(&self, token_id: U256) -> anyhow::Result<String>;
}
