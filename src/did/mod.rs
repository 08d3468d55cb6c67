// src/did/mod.rs
//! Decentralized identifiers: key fingerprints, `did:key` derivation and
//! resolution, and NFT identifiers of identity tokens.

pub mod fingerprint;
pub mod key_did;
pub mod nft_did;
pub mod resolver;

pub use fingerprint::{decode_fingerprint, encode_fingerprint, FingerprintEncoding};
pub use key_did::{derive_key_identity, KeyDid, KeyIdentity, KeyPairInput};
pub use nft_did::NftDid;
pub use resolver::{KeyResolver, LocalKeyResolver};
