// src/utils/serialization.rs
//! Serialization utilities for identity documents.
//!
//! Every text artifact produced by this crate (metadata document, signature
//! document) is pretty-printed JSON so that content hashes are stable for a
//! given value.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{IdentityError, Result};

/// Serializes a value to a pretty-printed JSON string.
pub fn serialize<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).map_err(Into::into)
}

/// Deserializes a value from a JSON string.
///
/// Blank input is reported as a malformed document rather than as a JSON
/// syntax error, since it usually means a collaborator returned nothing.
pub fn deserialize<T: DeserializeOwned>(data: &str) -> Result<T> {
    if data.trim().is_empty() {
        return Err(IdentityError::malformed_document("empty document text"));
    }
    serde_json::from_str(data).map_err(Into::into)
}
