// src/error.rs
//! Error taxonomy shared by every module of the identity crate.
//!
//! Precondition violations and malformed inputs fail fast with a typed
//! variant. Errors surfaced by external collaborators (ledger, content
//! store, key resolver) are carried unchanged in [`IdentityError::Collaborator`]
//! so callers can decide on retry or backoff.

use thiserror::Error;

/// Errors produced while building, signing, publishing or reconstructing
/// an identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A required prior state or field is missing (e.g. signing before a
    /// digest exists, finalizing before signing).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The reference set lacks one of the reserved keys.
    #[error("missing required reference: {0}")]
    MissingRequiredReference(String),

    /// A codec or document input is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Key material has an unsupported length or is not a valid curve point/scalar.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A mandatory key was not supplied.
    #[error("missing key: {0}")]
    MissingKey(String),

    /// An NFT DID string does not have the `did:nft:eip155:<chain>_erc721:<contract>_<token>` shape.
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Serialized document text does not have the identity document shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Settings could not be loaded.
    #[error(transparent)]
    Configuration(#[from] config::ConfigError),

    /// Failure reported by an external collaborator, passed through as is.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IdentityError>;

impl IdentityError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        IdentityError::PreconditionFailed(msg.into())
    }

    pub(crate) fn malformed_document(msg: impl Into<String>) -> Self {
        IdentityError::MalformedDocument(msg.into())
    }
}
