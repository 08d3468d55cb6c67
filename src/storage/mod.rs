// src/storage/mod.rs
//! Content-addressed storage for identity packages.

pub mod ipfs_client;
pub mod store;

pub use ipfs_client::IpfsStorage;
pub use store::{directory_locator, sibling_locator, ContentStore, MemoryStore, StoredEntry, StoredFile};
