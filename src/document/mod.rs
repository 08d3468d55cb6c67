// src/document/mod.rs
//! Metadata documents: a generic element tree and the identity schema
//! layered on top of it.

pub mod meta;
pub mod tree;

pub use meta::IdentityMeta;
pub use tree::{DocumentTree, NodeId};
