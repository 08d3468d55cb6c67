// src/blockchain/mod.rs
//! Ledger access: the contract the lifecycle depends on and its adapters.

pub mod ethers_client;
pub mod ledger;
pub mod memory;

pub use ethers_client::EthersLedger;
pub use ledger::Ledger;
pub use memory::MemoryLedger;
