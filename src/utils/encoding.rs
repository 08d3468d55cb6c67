// src/utils/encoding.rs
//! base64url codec for JWK coordinates and private key material.
//!
//! Multibase fingerprints go through the `multibase` crate instead; see
//! [`crate::did::fingerprint`].

use crate::error::{IdentityError, Result};

/// Encodes bytes as unpadded base64url.
pub fn encode_base64url(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

/// Decodes unpadded (or padded) base64url.
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>> {
    base64::decode_config(encoded.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
        .map_err(|e| IdentityError::InvalidArgument(format!("base64url decoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_is_url_safe_and_unpadded() {
        assert_eq!(encode_base64url(&[0xfb, 0xff]), "-_8");
        assert_eq!(encode_base64url(b"a"), "YQ");
        assert_eq!(decode_base64url("-_8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_base64url("YQ==").unwrap(), b"a".to_vec());
    }

    #[test]
    fn base64url_rejects_standard_alphabet() {
        assert!(matches!(
            decode_base64url("+/8"),
            Err(IdentityError::InvalidArgument(_))
        ));
    }
}
