// src/did/key_did.rs
//! `did:key` identities for secp256k1 keypairs.
//!
//! Given a keypair (or a freshly generated one), derives the identifier
//! `did:key:<fingerprint>`, the key reference `<identifier>#<fingerprint>`,
//! the keypair exported as JsonWebKey2020 and the DID Document obtained from
//! a [`KeyResolver`].

use std::fmt;

use ethers_core::types::Address;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};

use crate::did::fingerprint::{encode_fingerprint, FingerprintEncoding};
use crate::did::resolver::{public_jwk, KeyResolver, DID_KEY_PREFIX};
use crate::error::{IdentityError, Result};
use crate::models::did::{DidDocument, ExportedKey, JSON_WEB_KEY_2020};
use crate::utils::crypto::address_from_public_key;
use crate::utils::encoding::encode_base64url;

const PRIVATE_KEY_LEN: usize = 32;
const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;
const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;

/// Raw keypair bytes as handed over by a wallet or key generator.
#[derive(Clone, Default)]
pub struct KeyPairInput {
    pub private_key: Option<Vec<u8>>,
    /// Compressed (33 bytes) or uncompressed (65 bytes) SEC1 point.
    pub public_key: Option<Vec<u8>>,
}

/// Everything derived from a keypair.
#[derive(Debug, Clone)]
pub struct KeyIdentity {
    pub did: String,
    pub key_id: String,
    pub document: DidDocument,
    pub keys: Vec<ExportedKey>,
}

/// A secp256k1 keypair bound to its `did:key` identifier.
#[derive(Clone)]
pub struct KeyDid {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyDid {
    /// Generates a new keypair from the system RNG.
    pub fn generate() -> Self {
        let secret_key = SecretKey::random(&mut rand::thread_rng());
        let public_key = secret_key.public_key();
        KeyDid {
            secret_key,
            public_key,
        }
    }

    /// Builds a key DID from raw keypair bytes.
    ///
    /// The private key is mandatory. A missing public key is derived from
    /// it; a present one is normalized through SEC1 parsing.
    ///
    /// # Errors
    /// - [`IdentityError::MissingKey`] if no private key is given
    /// - [`IdentityError::InvalidKey`] on bad lengths or off-curve points
    pub fn from_keypair(keypair: KeyPairInput) -> Result<Self> {
        let private_key = keypair
            .private_key
            .ok_or_else(|| IdentityError::MissingKey("keyDid: private key not set".into()))?;
        if private_key.len() != PRIVATE_KEY_LEN {
            return Err(IdentityError::InvalidKey(format!(
                "expected a {}-byte private key, got {} bytes",
                PRIVATE_KEY_LEN,
                private_key.len()
            )));
        }
        let secret_key = SecretKey::from_slice(&private_key)
            .map_err(|_| IdentityError::InvalidKey("private key is not a valid scalar".into()))?;

        let public_key = match keypair.public_key {
            None => secret_key.public_key(),
            Some(bytes) => {
                if bytes.len() != COMPRESSED_PUBLIC_KEY_LEN && bytes.len() != UNCOMPRESSED_PUBLIC_KEY_LEN {
                    return Err(IdentityError::InvalidKey(format!(
                        "unsupported public key length: {} bytes",
                        bytes.len()
                    )));
                }
                PublicKey::from_sec1_bytes(&bytes)
                    .map_err(|_| IdentityError::InvalidKey("public key is not a curve point".into()))?
            }
        };

        Ok(KeyDid {
            secret_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// SEC1 compressed public key (33 bytes).
    pub fn compressed_public_key(&self) -> Vec<u8> {
        self.public_key.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Base58btc multibase fingerprint of the compressed public key.
    pub fn fingerprint(&self) -> String {
        encode_fingerprint(&self.compressed_public_key(), FingerprintEncoding::Base58Btc)
    }

    pub fn did(&self) -> String {
        format!("{}{}", DID_KEY_PREFIX, self.fingerprint())
    }

    pub fn key_id(&self) -> String {
        format!("{}#{}", self.did(), self.fingerprint())
    }

    /// Account address controlled by this key.
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key)
    }

    /// Exports the keypair as a JsonWebKey2020 entry, private part included.
    pub fn export(&self) -> ExportedKey {
        let public_key_jwk = public_jwk(&self.public_key);
        let mut private_key_jwk = public_key_jwk.clone();
        private_key_jwk.d = Some(encode_base64url(&self.secret_key.to_bytes()));
        ExportedKey {
            id: self.key_id(),
            kind: JSON_WEB_KEY_2020.to_string(),
            controller: self.did(),
            public_key_jwk,
            private_key_jwk,
        }
    }

    /// Resolves this identifier and bundles the document with the exported keys.
    pub async fn create_did_document<R>(&self, resolver: &R) -> Result<KeyIdentity>
    where
        R: KeyResolver + ?Sized,
    {
        let did = self.did();
        let document = resolver.resolve(&did).await?;
        Ok(KeyIdentity {
            key_id: self.key_id(),
            did,
            document,
            keys: vec![self.export()],
        })
    }
}

impl fmt::Debug for KeyDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDid").field("did", &self.did()).finish_non_exhaustive()
    }
}

/// Derives a key identity from an optional keypair. Without one, a fresh
/// keypair is generated.
pub async fn derive_key_identity<R>(keypair: Option<KeyPairInput>, resolver: &R) -> Result<KeyIdentity>
where
    R: KeyResolver + ?Sized,
{
    let key_did = match keypair {
        Some(keypair) => KeyDid::from_keypair(keypair)?,
        None => {
            log::debug!("no keypair supplied, generating a new secp256k1 key");
            KeyDid::generate()
        }
    };
    key_did.create_did_document(resolver).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::resolver::LocalKeyResolver;

    fn secret_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 32];
        bytes[31] = 7;
        bytes
    }

    #[test]
    fn missing_private_key_is_rejected() {
        let err = KeyDid::from_keypair(KeyPairInput::default()).unwrap_err();
        assert!(matches!(err, IdentityError::MissingKey(_)));
    }

    #[test]
    fn bad_public_key_length_is_rejected() {
        let err = KeyDid::from_keypair(KeyPairInput {
            private_key: Some(secret_bytes()),
            public_key: Some(vec![4u8; 64]),
        })
        .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidKey(_)));
    }

    #[test]
    fn uncompressed_and_derived_public_keys_agree() {
        let derived = KeyDid::from_keypair(KeyPairInput {
            private_key: Some(secret_bytes()),
            public_key: None,
        })
        .unwrap();
        let uncompressed = derived.public_key().to_encoded_point(false).as_bytes().to_vec();
        let supplied = KeyDid::from_keypair(KeyPairInput {
            private_key: Some(secret_bytes()),
            public_key: Some(uncompressed),
        })
        .unwrap();

        assert_eq!(derived.did(), supplied.did());
        assert_eq!(supplied.compressed_public_key().len(), 33);
        assert!(supplied.did().starts_with("did:key:zQ3s"));
        assert_eq!(supplied.key_id(), format!("{}#{}", supplied.did(), supplied.fingerprint()));
    }

    #[tokio::test]
    async fn document_lists_the_key_reference() {
        let identity = derive_key_identity(None, &LocalKeyResolver).await.unwrap();
        assert_eq!(identity.document.id, identity.did);
        assert_eq!(identity.document.verification_method[0].id, identity.key_id);
        assert_eq!(identity.document.authentication, vec![identity.key_id.clone()]);
        assert_eq!(
            identity.document.verification_method[0].public_key_jwk,
            identity.keys[0].private_key_jwk.public()
        );
        assert!(identity.keys[0].private_key_jwk.d.is_some());
    }
}
