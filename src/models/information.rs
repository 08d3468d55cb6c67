// src/models/information.rs
//! Identity information: the subject attributes that a metadata document
//! is built from, and that parsing a document recovers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One entry of a descriptor's `componentInfo` list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentData {
    pub e_id: String,
    pub href: String,
    pub name: String,
    pub show_as: String,
}

impl ComponentData {
    pub fn new(e_id: &str, href: &str, name: &str, show_as: &str) -> Self {
        Self {
            e_id: e_id.to_string(),
            href: href.to_string(),
            name: name.to_string(),
            show_as: show_as.to_string(),
        }
    }
}

/// A FRBR bibliographic descriptor (Work, Expression or Manifestation).
///
/// Fields left as `None` are synthesized from the identity date and subject
/// id when the document is built; `Some` values override them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FrbrDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentData>,
}

/// A caller-supplied body section of the metadata document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BodyBlock {
    pub block_title: String,
    /// Paragraph text keyed by paragraph id, in document order.
    #[serde(default)]
    pub paragraphs: IndexMap<String, String>,
}

/// Personal information of an identity subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentityInformation {
    /// Issuance date, `YYYY-MM-DD`.
    pub identity_date: String,
    /// Subject identifier.
    pub did: String,
    #[serde(default, rename = "FRBRWork")]
    pub frbr_work: FrbrDescriptor,
    #[serde(default, rename = "FRBRExpression")]
    pub frbr_expression: FrbrDescriptor,
    #[serde(default, rename = "FRBRManifestation")]
    pub frbr_manifestation: FrbrDescriptor,
    /// Extra body sections keyed by section id.
    #[serde(default)]
    pub additional_body: IndexMap<String, BodyBlock>,
}

impl IdentityInformation {
    pub fn new(identity_date: impl Into<String>, did: impl Into<String>) -> Self {
        Self {
            identity_date: identity_date.into(),
            did: did.into(),
            ..Default::default()
        }
    }
}
