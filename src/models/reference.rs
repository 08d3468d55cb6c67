// src/models/reference.rs
//! References from an identity to other persons, organizations and objects.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key of the identity subject reference.
pub const IDENTITY_SUBJECT: &str = "iid";
/// Key of the DID document reference.
pub const IDENTITY_DID_DOCUMENT: &str = "iidDIDDoc";
/// Key of the issuer reference.
pub const IDENTITY_ISSUER: &str = "iidIssuer";

/// Keys every reference set must contain.
pub const REQUIRED_REFERENCES: [&str; 3] = [IDENTITY_SUBJECT, IDENTITY_DID_DOCUMENT, IDENTITY_ISSUER];

/// Element tag used for references that do not name a type.
pub const DEFAULT_REFERENCE_TYPE: &str = "TLCPerson";

/// Reference set keyed by relationship, in insertion order.
pub type References = IndexMap<String, Reference>;

/// One named relationship of the identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Element tag of the reference (e.g. `TLCObject`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Entity label.
    pub entity: String,
    /// Stable element id, `#<key>` by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e_id: Option<String>,
    /// Display label, the key by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_as: Option<String>,
    /// Resolvable locator, usually filled in after content addressing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Reference {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Fills in the defaults for a reference stored under `key`.
    pub fn normalized(&self, key: &str) -> Self {
        Self {
            kind: Some(self.kind.clone().unwrap_or_else(|| DEFAULT_REFERENCE_TYPE.to_string())),
            entity: self.entity.clone(),
            e_id: Some(self.e_id.clone().unwrap_or_else(|| format!("#{}", key))),
            show_as: Some(self.show_as.clone().unwrap_or_else(|| key.to_string())),
            href: self.href.clone(),
        }
    }
}
