// src/did/resolver.rs
//! Resolution of `did:key` identifiers to DID Documents.

use async_trait::async_trait;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use crate::did::fingerprint::decode_fingerprint;
use crate::error::IdentityError;
use crate::models::did::{
    DidDocument, Jwk, VerificationMethod, DID_CONTEXT, JSON_WEB_KEY_2020, JWS_2020_CONTEXT,
};
use crate::utils::encoding::encode_base64url;

/// Method prefix of key identifiers.
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Maps an identifier to its DID Document.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> anyhow::Result<DidDocument>;
}

/// Resolves `did:key` identifiers of secp256k1 keys without any network
/// access: the document is fully determined by the key in the identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeyResolver;

#[async_trait]
impl KeyResolver for LocalKeyResolver {
    async fn resolve(&self, did: &str) -> anyhow::Result<DidDocument> {
        let fingerprint = did.strip_prefix(DID_KEY_PREFIX).ok_or_else(|| {
            IdentityError::MalformedIdentifier(format!("not a did:key identifier: {}", did))
        })?;
        let key_bytes = decode_fingerprint(fingerprint)?;
        let public_key = PublicKey::from_sec1_bytes(&key_bytes)
            .map_err(|e| IdentityError::InvalidKey(format!("invalid secp256k1 point: {}", e)))?;
        log::debug!("resolved did:key locally: {}", did);
        Ok(key_document(did, fingerprint, &public_key))
    }
}

/// Builds the public JWK of a secp256k1 key.
pub fn public_jwk(public_key: &PublicKey) -> Jwk {
    let point = public_key.to_encoded_point(false);
    let bytes = point.as_bytes();
    Jwk {
        kty: "EC".to_string(),
        crv: "secp256k1".to_string(),
        x: encode_base64url(&bytes[1..33]),
        y: encode_base64url(&bytes[33..65]),
        d: None,
    }
}

fn key_document(did: &str, fingerprint: &str, public_key: &PublicKey) -> DidDocument {
    let key_id = format!("{}#{}", did, fingerprint);
    DidDocument {
        context: vec![DID_CONTEXT.to_string(), JWS_2020_CONTEXT.to_string()],
        id: did.to_string(),
        verification_method: vec![VerificationMethod {
            id: key_id.clone(),
            kind: JSON_WEB_KEY_2020.to_string(),
            controller: did.to_string(),
            public_key_jwk: public_jwk(public_key),
        }],
        authentication: vec![key_id.clone()],
        assertion_method: vec![key_id.clone()],
        capability_invocation: vec![key_id.clone()],
        capability_delegation: vec![key_id],
    }
}
