// src/models/signature.rs
//! Signature records and the document that collects them.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::serialization::{deserialize, serialize};

/// A named signature over an identity's content digest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    /// Element reference of the signer (e.g. `#iidIssuer`).
    pub signer: String,
    /// Entity label of the signer.
    pub signer_label: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// `0x`-prefixed 65-byte `r || s || v` signature.
    pub value: String,
}

/// Ordered collection of signature records, serialized next to the
/// metadata document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureDocument {
    signatures: Vec<SignatureRecord>,
}

impl SignatureDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_signature(&mut self, record: SignatureRecord) {
        self.signatures.push(record);
    }

    pub fn signatures(&self) -> &[SignatureRecord] {
        &self.signatures
    }

    /// The most recently appended record.
    pub fn latest(&self) -> Option<&SignatureRecord> {
        self.signatures.last()
    }

    /// Serializes the document to text.
    pub fn finalize(&self) -> Result<String> {
        serialize(self)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        deserialize(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_last_appended() {
        let mut doc = SignatureDocument::new();
        assert!(doc.latest().is_none());
        for (i, value) in ["0x01", "0x02"].iter().enumerate() {
            doc.add_signature(SignatureRecord {
                signer: "#iidIssuer".into(),
                signer_label: "Issuer".into(),
                timestamp: i as i64,
                value: value.to_string(),
            });
        }
        assert_eq!(doc.latest().unwrap().value, "0x02");

        let restored = SignatureDocument::from_text(&doc.finalize().unwrap()).unwrap();
        assert_eq!(restored, doc);
    }
}
