// src/utils/crypto.rs
//! Cryptographic utilities optimized for blockchain compatibility.
//!
//! Uses Keccak-256 (Ethereum's standard hash function) for digests, the
//! personal-message prefix and address derivation.

use ethers_core::types::Address;
use ethers_core::utils::keccak256;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

/// Literal prepended to payloads by the personal-message signing convention.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Hashes a payload the way `personal_sign` does before signing:
/// `keccak256(prefix || decimal(len(payload)) || payload)`.
///
/// Computed explicitly rather than through the provider so that recovery
/// can run without a node.
pub fn hash_personal_message(payload: &[u8]) -> [u8; 32] {
    let mut data = format!("{}{}", PERSONAL_MESSAGE_PREFIX, payload.len()).into_bytes();
    data.extend_from_slice(payload);
    hash_data(&data)
}

/// Derives the 20-byte account address of a secp256k1 public key: the last
/// 20 bytes of the Keccak-256 hash of the uncompressed point without its
/// `0x04` tag.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let point = public_key.to_encoded_point(false);
    let hash = hash_data(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Renders bytes as `0x`-prefixed lowercase hex.
pub fn to_lower_hex(bytes: &[u8]) -> String {
    format!("0x{}", ethers_core::utils::hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::SecretKey;

    #[test]
    fn personal_message_hash_matches_known_vector() {
        let hash = hash_personal_message(b"Hello world");
        assert_eq!(
            to_lower_hex(&hash),
            "0x8144a6fa26be252b86456491fbcd43c1de7e022241845ffea1c3df066f7cfede"
        );
    }

    #[test]
    fn address_of_private_key_one() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let secret = SecretKey::from_slice(&bytes).unwrap();
        let address = address_from_public_key(&secret.public_key());
        assert_eq!(
            to_lower_hex(address.as_bytes()),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }
}
