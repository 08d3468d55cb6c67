// src/models/did.rs
//! Decentralized Identifier (DID) data model implementation.
//!
//! Defines the DID Document shape produced for `did:key` identifiers of
//! secp256k1 keys, following the
//! [DID Core Specification](https://www.w3.org/TR/did-core/) with
//! JsonWebKey2020 verification methods.

use serde::{Deserialize, Serialize};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const JWS_2020_CONTEXT: &str = "https://w3id.org/security/suites/jws-2020/v1";
pub const JSON_WEB_KEY_2020: &str = "JsonWebKey2020";

/// An elliptic-curve JSON Web Key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    /// Private scalar, only present in exported private keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl Jwk {
    /// Returns a copy without the private scalar.
    pub fn public(&self) -> Self {
        Self { d: None, ..self.clone() }
    }
}

/// A verification method entry of a DID Document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub controller: String,
    pub public_key_jwk: Jwk,
}

/// A DID Document representing a decentralized identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// The complete DID string identifier
    pub id: String,
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default)]
    pub authentication: Vec<String>,
    #[serde(default)]
    pub assertion_method: Vec<String>,
    #[serde(default)]
    pub capability_invocation: Vec<String>,
    #[serde(default)]
    pub capability_delegation: Vec<String>,
}

/// A keypair exported as a JsonWebKey2020 entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportedKey {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub controller: String,
    pub public_key_jwk: Jwk,
    pub private_key_jwk: Jwk,
}
