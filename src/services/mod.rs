// src/services/mod.rs
//! Identity services: signing and verifying digests, and driving an
//! identity through its lifecycle.

pub mod identity;
pub mod signature;

pub use identity::{Identity, Stage, Web3Binding};
pub use signature::{recover_address, verify, SignatureProtocol};
