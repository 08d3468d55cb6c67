// src/blockchain/memory.rs
//! In-process ledger with local accounts.
//!
//! Keeps token reservations and URIs in memory and signs with local
//! wallets, so the identity lifecycle can run without a node.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, U256};

use crate::blockchain::ledger::Ledger;

#[derive(Default)]
struct LedgerState {
    last_token_id: u64,
    /// Reserved token id -> reserving owner
    reserved: HashMap<U256, Address>,
    /// Minted token id -> token URI
    uris: BTreeMap<U256, String>,
    /// Holder -> tokens in issue order
    holdings: HashMap<Address, Vec<U256>>,
}

pub struct MemoryLedger {
    chain_id: u64,
    contract: Address,
    accounts: Vec<LocalWallet>,
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new(chain_id: u64, contract: Address) -> Self {
        Self {
            chain_id,
            contract,
            accounts: Vec::new(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Adds `count` freshly generated accounts.
    pub fn with_random_accounts(mut self, count: usize) -> Self {
        for _ in 0..count {
            let wallet = LocalWallet::new(&mut rand::thread_rng()).with_chain_id(self.chain_id);
            self.accounts.push(wallet);
        }
        self
    }

    pub fn with_wallet(mut self, wallet: LocalWallet) -> Self {
        self.accounts.push(wallet.with_chain_id(self.chain_id));
        self
    }

    /// Account addresses in the order they were added.
    pub fn accounts(&self) -> Vec<Address> {
        self.accounts.iter().map(|w| w.address()).collect()
    }

    fn wallet(&self, address: Address) -> anyhow::Result<&LocalWallet> {
        self.accounts
            .iter()
            .find(|w| w.address() == address)
            .ok_or_else(|| anyhow::anyhow!("unknown account {:?}", address))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LedgerState) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("ledger state lock poisoned"))?;
        f(&mut state)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.chain_id)
    }

    async fn reserve_token_id(&self, owner: Address) -> anyhow::Result<U256> {
        self.with_state(|state| {
            state.last_token_id += 1;
            let token_id = U256::from(state.last_token_id);
            state.reserved.insert(token_id, owner);
            log::debug!("reserved token {} for {:?}", token_id, owner);
            Ok(token_id)
        })
    }

    async fn mint_reserved(&self, owner: Address, token_id: U256, recipient: Address, uri: &str) -> anyhow::Result<()> {
        self.with_state(|state| {
            match state.reserved.get(&token_id) {
                Some(reserver) if *reserver == owner => {}
                Some(_) => anyhow::bail!("token {} was reserved by another account", token_id),
                None => anyhow::bail!("token {} is not reserved", token_id),
            }
            state.reserved.remove(&token_id);
            state.uris.insert(token_id, uri.to_string());
            state.holdings.entry(recipient).or_default().push(token_id);
            log::debug!("minted token {} to {:?}", token_id, recipient);
            Ok(())
        })
    }

    async fn sign_personal(&self, payload: &str, address: Address) -> anyhow::Result<Signature> {
        Ok(self.wallet(address)?.sign_message(payload).await?)
    }

    async fn sign(&self, payload: &str, address: Address) -> anyhow::Result<Signature> {
        // eth_sign on a local account applies the same message prefix.
        Ok(self.wallet(address)?.sign_message(payload).await?)
    }

    async fn last_token_of(&self, owner: Address) -> anyhow::Result<U256> {
        self.with_state(|state| {
            state
                .holdings
                .get(&owner)
                .and_then(|tokens| tokens.last().copied())
                .ok_or_else(|| anyhow::anyhow!("no identity token issued to {:?}", owner))
        })
    }

    async fn token_uri(&self, token_id: U256) -> anyhow::Result<String> {
        self.with_state(|state| {
            state
                .uris
                .get(&token_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("token {} does not exist", token_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn minting_requires_the_reserving_owner() {
        let ledger = MemoryLedger::new(5, Address::repeat_byte(0xaa)).with_random_accounts(2);
        let accounts = ledger.accounts();

        let token_id = ledger.reserve_token_id(accounts[0]).await.unwrap();
        assert!(ledger
            .mint_reserved(accounts[1], token_id, accounts[1], "uri")
            .await
            .is_err());

        ledger
            .mint_reserved(accounts[0], token_id, accounts[1], "cid/main.xml")
            .await
            .unwrap();
        assert_eq!(ledger.last_token_of(accounts[1]).await.unwrap(), token_id);
        assert_eq!(ledger.token_uri(token_id).await.unwrap(), "cid/main.xml");
        assert!(ledger.last_token_of(accounts[0]).await.is_err());
    }
}
