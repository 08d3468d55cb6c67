// src/services/signature.rs
//! Signature protocol over identity digests.
//!
//! Two schemes are supported:
//! - **personal**: the ledger's `personal_sign` convention, recovered from
//!   the library's message-prefix hash
//! - **non-personal**: the ledger's `eth_sign`, recovered by hashing the
//!   digest with the personal-message prefix explicitly
//!
//! Both run secp256k1 public key recovery on the decoded `(r, s, v)`, so a
//! high-s signature is accepted by either scheme.
//!
//! Verification never trusts a claimed address; it recovers the signer
//! and compares. A bad signature yields `false`, never an error.

use std::sync::Arc;

use chrono::Utc;
use ethers::types::{Address, Signature};
use ethers::utils::hash_message;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::PublicKey;

use crate::blockchain::Ledger;
use crate::error::{IdentityError, Result};
use crate::models::signature::SignatureRecord;
use crate::utils::crypto::{address_from_public_key, hash_personal_message, to_lower_hex};

/// Length of an `r || s || v` signature.
const SIGNATURE_LENGTH: usize = 65;

/// Signs digests for a main address through a ledger.
pub struct SignatureProtocol<L: Ledger> {
    ledger: Arc<L>,
    main_address: Option<Address>,
}

impl<L: Ledger> SignatureProtocol<L> {
    pub fn new(ledger: Arc<L>, main_address: Option<Address>) -> Self {
        Self {
            ledger,
            main_address,
        }
    }

    /// Signs `digest` with the main address.
    ///
    /// `personal` defaults to the personal scheme when `None`.
    ///
    /// # Errors
    /// - [`IdentityError::PreconditionFailed`] without a main address or
    ///   with an empty digest
    /// - [`IdentityError::Collaborator`] if the ledger refuses to sign
    pub async fn sign_data(&self, digest: &str, personal: Option<bool>) -> Result<Signature> {
        let address = self
            .main_address
            .ok_or_else(|| IdentityError::precondition("a main address is needed to sign"))?;
        if digest.is_empty() {
            return Err(IdentityError::precondition("cannot sign an empty digest"));
        }

        let signature = if personal.unwrap_or(true) {
            self.ledger.sign_personal(digest, address).await?
        } else {
            self.ledger.sign(digest, address).await?
        };
        log::debug!("signed digest {} with {:?}", digest, address);
        Ok(signature)
    }

    /// Signs `digest` and wraps the result in a timestamped record for
    /// `signer` (an element reference such as `#iidIssuer`).
    pub async fn sign(
        &self,
        digest: &str,
        personal: Option<bool>,
        signer: &str,
        signer_label: &str,
    ) -> Result<SignatureRecord> {
        let signature = self.sign_data(digest, personal).await?;
        Ok(SignatureRecord {
            signer: signer.to_string(),
            signer_label: signer_label.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            value: to_lower_hex(&signature.to_vec()),
        })
    }
}

/// Recovers the address that produced `signature` over `digest`.
///
/// # Errors
/// - [`IdentityError::PreconditionFailed`] if either input is empty
/// - [`IdentityError::InvalidArgument`] if the signature cannot be decoded
///   or no key recovers from it
pub fn recover_address(digest: &str, signature: &str, personal: Option<bool>) -> Result<Address> {
    if digest.is_empty() || signature.is_empty() {
        return Err(IdentityError::precondition(
            "both a digest and a signature are needed to recover a signer",
        ));
    }

    let prehash = if personal.unwrap_or(true) {
        hash_message(digest).to_fixed_bytes()
    } else {
        hash_personal_message(digest.as_bytes())
    };
    let (r_s, v) = decode_signature(signature)?;
    let public_key = recover_public_key(&prehash, &r_s, v)?;
    Ok(address_from_public_key(&public_key))
}

/// Checks that `signature` over `digest` was made by `expected`.
///
/// Returns `Ok(false)` for any signature that does not recover to
/// `expected`, including undecodable ones.
pub fn verify(digest: &str, signature: &str, expected: Address, personal: Option<bool>) -> Result<bool> {
    match recover_address(digest, signature, personal) {
        Ok(recovered) if recovered == expected => Ok(true),
        Ok(recovered) => {
            log::warn!(
                "signature recovers to {:?}, expected {:?}",
                recovered,
                expected
            );
            Ok(false)
        }
        Err(IdentityError::PreconditionFailed(msg)) => Err(IdentityError::PreconditionFailed(msg)),
        Err(e) => {
            log::warn!("signature rejected: {}", e);
            Ok(false)
        }
    }
}

/// Splits a hex `r || s || v` signature into its 64-byte `r || s` and `v`.
fn decode_signature(signature: &str) -> Result<([u8; 64], u8)> {
    let bytes = ethers::utils::hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| IdentityError::InvalidArgument(format!("Invalid signature hex: {}", e)))?;
    if bytes.len() != SIGNATURE_LENGTH {
        return Err(IdentityError::InvalidArgument(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            bytes.len()
        )));
    }
    let mut r_s = [0u8; 64];
    r_s.copy_from_slice(&bytes[..64]);
    Ok((r_s, bytes[64]))
}

fn recover_public_key(prehash: &[u8; 32], r_s: &[u8; 64], v: u8) -> Result<PublicKey> {
    let recid = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => {
            return Err(IdentityError::InvalidArgument(format!(
                "Invalid recovery id {}",
                other
            )))
        }
    };
    let mut signature = EcdsaSignature::from_slice(r_s)
        .map_err(|e| IdentityError::InvalidArgument(format!("Invalid signature: {}", e)))?;
    let mut recovery_id = RecoveryId::from_byte(recid)
        .ok_or_else(|| IdentityError::InvalidArgument(format!("Invalid recovery id {}", v)))?;

    // High-s signatures recover only after flipping s and the parity bit.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let verifying_key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
        .map_err(|e| IdentityError::InvalidArgument(format!("Key recovery failed: {}", e)))?;
    Ok(PublicKey::from(&verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MemoryLedger;
    use k256::elliptic_curve::PrimeField;
    use rand::RngCore;

    fn random_digest() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        to_lower_hex(&bytes)
    }

    fn protocol() -> (SignatureProtocol<MemoryLedger>, Address) {
        let ledger = MemoryLedger::new(5, Address::repeat_byte(0x11)).with_random_accounts(1);
        let address = ledger.accounts()[0];
        (SignatureProtocol::new(Arc::new(ledger), Some(address)), address)
    }

    #[tokio::test]
    async fn personal_signature_verifies_and_bit_flip_fails() {
        let (protocol, address) = protocol();
        let digest = random_digest();

        let record = protocol
            .sign(&digest, Some(true), "#iidIssuer", "Issuer")
            .await
            .unwrap();
        assert_eq!(record.signer, "#iidIssuer");
        assert_eq!(record.value.len(), 2 + 2 * SIGNATURE_LENGTH);
        assert!(verify(&digest, &record.value, address, Some(true)).unwrap());

        let mut bytes = ethers::utils::hex::decode(&record.value[2..]).unwrap();
        bytes[10] ^= 0x01;
        let tampered = to_lower_hex(&bytes);
        assert!(!verify(&digest, &tampered, address, Some(true)).unwrap());
        assert!(!verify(&digest, &tampered, address, Some(false)).unwrap());
    }

    #[tokio::test]
    async fn both_schemes_recover_the_same_address() {
        let (protocol, address) = protocol();
        let digest = random_digest();

        let personal = protocol.sign_data(&digest, Some(true)).await.unwrap();
        let plain = protocol.sign_data(&digest, Some(false)).await.unwrap();

        let personal_hex = to_lower_hex(&personal.to_vec());
        let plain_hex = to_lower_hex(&plain.to_vec());
        assert_eq!(recover_address(&digest, &personal_hex, Some(true)).unwrap(), address);
        assert_eq!(recover_address(&digest, &plain_hex, Some(false)).unwrap(), address);
        assert_eq!(
            recover_address(&digest, &personal_hex, Some(false)).unwrap(),
            recover_address(&digest, &plain_hex, Some(true)).unwrap()
        );
    }

    /// Rewrites a low-s signature as its equally valid high-s twin.
    fn to_high_s(signature: &Signature) -> String {
        let bytes = signature.to_vec();
        let s = k256::Scalar::from_repr(k256::FieldBytes::clone_from_slice(&bytes[32..64])).unwrap();
        let mut twin = bytes[..32].to_vec();
        twin.extend_from_slice(&(-s).to_bytes());
        twin.push(match bytes[64] {
            27 => 28,
            28 => 27,
            0 => 1,
            _ => 0,
        });
        to_lower_hex(&twin)
    }

    #[tokio::test]
    async fn high_s_signatures_verify_under_both_schemes() {
        let (protocol, address) = protocol();
        let digest = random_digest();

        for personal in [true, false] {
            let signature = protocol.sign_data(&digest, Some(personal)).await.unwrap();
            let high_s = to_high_s(&signature);
            assert_ne!(high_s, to_lower_hex(&signature.to_vec()));
            assert!(verify(&digest, &high_s, address, Some(true)).unwrap());
            assert!(verify(&digest, &high_s, address, Some(false)).unwrap());
        }
    }

    #[tokio::test]
    async fn signing_needs_an_address_and_a_digest() {
        let (protocol, _) = protocol();
        assert!(matches!(
            protocol.sign_data("", None).await,
            Err(IdentityError::PreconditionFailed(_))
        ));

        let ledger = Arc::new(MemoryLedger::new(5, Address::zero()));
        let unbound = SignatureProtocol::new(ledger, None);
        assert!(matches!(
            unbound.sign_data("0x01", None).await,
            Err(IdentityError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn empty_inputs_are_rejected_and_garbage_is_false() {
        assert!(matches!(
            verify("", "0x00", Address::zero(), None),
            Err(IdentityError::PreconditionFailed(_))
        ));
        assert!(matches!(
            verify("0x01", "", Address::zero(), None),
            Err(IdentityError::PreconditionFailed(_))
        ));
        assert!(!verify("0x01", "0xnothex", Address::zero(), Some(false)).unwrap());
        assert!(!verify("0x01", "0x0102", Address::zero(), Some(true)).unwrap());
    }
}
