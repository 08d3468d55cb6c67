// src/lib.rs
//! Intelligible identities: ledger-anchored identity documents.
//!
//! An identity is a metadata document describing a subject, its DID
//! document and its issuer, signed by the issuer's account and bound to an
//! ERC-721 token whose URI points at the published document.
//!
//! Modules:
//! - [`did`]: key fingerprints, `did:key` derivation and NFT DIDs
//! - [`document`]: the metadata document model
//! - [`services`]: signature protocol and identity lifecycle
//! - [`blockchain`] and [`storage`]: ledger and content-store adapters

pub mod blockchain;
pub mod config;
pub mod did;
pub mod document;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use blockchain::{EthersLedger, Ledger, MemoryLedger};
pub use config::Settings;
pub use did::{derive_key_identity, KeyDid, KeyIdentity, KeyPairInput, NftDid};
pub use document::IdentityMeta;
pub use error::{IdentityError, Result};
pub use models::{IdentityInformation, Reference, References, SignatureDocument, SignatureRecord};
pub use services::{Identity, Stage};
pub use storage::{ContentStore, IpfsStorage, MemoryStore};
