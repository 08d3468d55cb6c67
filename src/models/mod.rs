// src/models/mod.rs
//! Data structures exchanged between the document model, the signature
//! protocol and the lifecycle orchestrator.

pub mod did;
pub mod information;
pub mod reference;
pub mod signature;

pub use information::{BodyBlock, ComponentData, FrbrDescriptor, IdentityInformation};
pub use reference::{Reference, References};
pub use signature::{SignatureDocument, SignatureRecord};
