// src/did/fingerprint.rs
//! Multicodec/multibase fingerprints of secp256k1 public keys.
//!
//! A fingerprint is the compressed public key prefixed with the two-byte
//! multicodec header `0xe7 0x01`, rendered with a multibase prefix naming
//! the text encoding (`z` for base58btc, `u` for base64url).

use std::fmt;
use std::str::FromStr;

use multibase::Base;

use crate::error::{IdentityError, Result};

/// Multicodec tag of a secp256k1 public key.
pub const SECP256K1_MULTICODEC_IDENTIFIER: u8 = 0xe7;

/// Terminating byte of the single-byte variable integer header.
pub const VARIABLE_INTEGER_TRAILING_BYTE: u8 = 0x01;

/// Text encoding of a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintEncoding {
    #[default]
    Base58Btc,
    Base64Url,
}

impl FingerprintEncoding {
    fn base(self) -> Base {
        match self {
            FingerprintEncoding::Base58Btc => Base::Base58Btc,
            FingerprintEncoding::Base64Url => Base::Base64Url,
        }
    }
}

impl fmt::Display for FingerprintEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintEncoding::Base58Btc => f.write_str("base58btc"),
            FingerprintEncoding::Base64Url => f.write_str("base64url"),
        }
    }
}

impl FromStr for FingerprintEncoding {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "base58btc" => Ok(FingerprintEncoding::Base58Btc),
            "base64url" => Ok(FingerprintEncoding::Base64Url),
            other => Err(IdentityError::InvalidArgument(format!(
                "Unsupported encoding: {}",
                other
            ))),
        }
    }
}

/// Builds the multibase fingerprint of a public key.
///
/// # Arguments
/// * `public_key` - Compressed public key bytes
/// * `encoding` - Output text encoding
pub fn encode_fingerprint(public_key: &[u8], encoding: FingerprintEncoding) -> String {
    let mut buffer = Vec::with_capacity(2 + public_key.len());
    buffer.push(SECP256K1_MULTICODEC_IDENTIFIER);
    buffer.push(VARIABLE_INTEGER_TRAILING_BYTE);
    buffer.extend_from_slice(public_key);

    multibase::encode(encoding.base(), buffer)
}

/// Same as [`encode_fingerprint`] but takes the encoding by name
/// (`"base58btc"` or `"base64url"`).
pub fn encode_fingerprint_named(public_key: &[u8], encoding: &str) -> Result<String> {
    Ok(encode_fingerprint(public_key, encoding.parse()?))
}

/// Inverts [`encode_fingerprint`], returning the raw public key bytes.
pub fn decode_fingerprint(fingerprint: &str) -> Result<Vec<u8>> {
    let (base, bytes) = multibase::decode(fingerprint)
        .map_err(|e| IdentityError::InvalidArgument(format!("invalid fingerprint: {}", e)))?;
    if !matches!(base, Base::Base58Btc | Base::Base64Url) {
        return Err(IdentityError::InvalidArgument(format!(
            "unsupported multibase encoding {:?}",
            base
        )));
    }

    match bytes.as_slice() {
        [SECP256K1_MULTICODEC_IDENTIFIER, VARIABLE_INTEGER_TRAILING_BYTE, key @ ..] if !key.is_empty() => {
            Ok(key.to_vec())
        }
        _ => Err(IdentityError::InvalidArgument(
            "fingerprint is not a secp256k1 multicodec key".into(),
        )),
    }
}
