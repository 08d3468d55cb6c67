// src/utils/mod.rs
//! Helper functions: hashing, text codecs and serialization.

pub mod crypto;
pub mod encoding;
pub mod serialization;
