// src/document/meta.rs
//! Identity metadata document.
//!
//! Builds the cross-referencing document of an identity from its
//! [`IdentityInformation`] and [`References`], and recovers both from a
//! loaded document. The layout is:
//!
//! ```text
//! akomaNtoso/doc
//!   meta/identification/{FRBRWork, FRBRExpression, FRBRManifestation}
//!   meta/references/<type eId href showAs>*
//!   preface/p/docTitle
//!   mainBody/tblock[eId=tblock_1]        "Identity Information"
//!     p[eId=tblock_1__p_<key>]/entity[eId=ii_block_<key>, refersTo=<ref eId>]
//!   mainBody/tblock[eId=<section id>]*   caller sections
//! ```

use indexmap::IndexMap;

use crate::document::tree::{DocumentTree, NodeId, EID_ATTRIBUTE};
use crate::error::{IdentityError, Result};
use crate::models::information::{BodyBlock, ComponentData, FrbrDescriptor, IdentityInformation};
use crate::models::reference::{
    Reference, References, IDENTITY_ISSUER, IDENTITY_SUBJECT, REQUIRED_REFERENCES,
};

const ROOT_TAG: &str = "akomaNtoso";
const DOC_TAG: &str = "doc";
const DOC_NAME: &str = "identity";
const META_TAG: &str = "meta";
const IDENTIFICATION_TAG: &str = "identification";
const REFERENCES_TAG: &str = "references";
const PREFACE_TAG: &str = "preface";
const DOC_TITLE_TAG: &str = "docTitle";
const MAIN_BODY_TAG: &str = "mainBody";
const BLOCK_TAG: &str = "tblock";
const HEADING_TAG: &str = "heading";
const PARAGRAPH_TAG: &str = "p";
const ENTITY_TAG: &str = "entity";
const COMPONENT_INFO_TAG: &str = "componentInfo";
const COMPONENT_DATA_TAG: &str = "componentData";

/// Section id of the synthesized Identity Information block.
pub const IDENTITY_SECTION_ID: &str = "tblock_1";
/// Heading of the synthesized Identity Information block.
pub const IDENTITY_SECTION_TITLE: &str = "Identity Information";
/// Prefix of the entity element ids inside the Identity Information block.
pub const ENTITY_ID_PREFIX: &str = "ii_block_";

#[derive(Debug, Clone, Copy)]
enum Frbr {
    Work,
    Expression,
    Manifestation,
}

impl Frbr {
    const ALL: [Frbr; 3] = [Frbr::Work, Frbr::Expression, Frbr::Manifestation];

    fn tag(self) -> &'static str {
        match self {
            Frbr::Work => "FRBRWork",
            Frbr::Expression => "FRBRExpression",
            Frbr::Manifestation => "FRBRManifestation",
        }
    }

    fn this_suffix(self) -> &'static str {
        match self {
            Frbr::Work => "/main",
            Frbr::Expression => "/eng@!main",
            Frbr::Manifestation => "/eng@/main.xml",
        }
    }

    fn uri_suffix(self) -> &'static str {
        match self {
            Frbr::Work => "",
            Frbr::Expression => "/eng@",
            Frbr::Manifestation => "/eng@.akn",
        }
    }

    /// The main-document and DID-document components, in that order.
    fn fixed_components(self) -> [ComponentData; 2] {
        match self {
            Frbr::Work => [
                ComponentData::new("wmain", "#emain", "main", "Main document"),
                ComponentData::new("wdiddoc", "#ediddoc", "diddoc", "DID Document"),
            ],
            Frbr::Expression => [
                ComponentData::new("emain", "#mmain", "main", "Main document"),
                ComponentData::new("ediddoc", "#wdiddoc", "diddoc", "DID Document"),
            ],
            Frbr::Manifestation => [
                ComponentData::new("mmain", "main.xml", "main", "Main document"),
                ComponentData::new("mdiddoc", "diddoc.json", "diddoc", "DID Document"),
            ],
        }
    }

    fn of(self, information: &IdentityInformation) -> &FrbrDescriptor {
        match self {
            Frbr::Work => &information.frbr_work,
            Frbr::Expression => &information.frbr_expression,
            Frbr::Manifestation => &information.frbr_manifestation,
        }
    }

    fn of_mut(self, information: &mut IdentityInformation) -> &mut FrbrDescriptor {
        match self {
            Frbr::Work => &mut information.frbr_work,
            Frbr::Expression => &mut information.frbr_expression,
            Frbr::Manifestation => &mut information.frbr_manifestation,
        }
    }

    /// Canonical descriptor merged with the caller's overrides.
    fn expand(self, information: &IdentityInformation, author: &str) -> FrbrDescriptor {
        let base = format!("/akn/eu/doc/{}/{}", information.identity_date, information.did);
        let supplied = self.of(information);
        let mut components = supplied.components.clone();
        for fixed in self.fixed_components() {
            // Descriptors parsed back from a document already carry them.
            if !components.iter().any(|c| c.e_id == fixed.e_id) {
                components.push(fixed);
            }
        }
        FrbrDescriptor {
            this: Some(
                supplied
                    .this
                    .clone()
                    .unwrap_or_else(|| format!("{}{}", base, self.this_suffix())),
            ),
            uri: Some(
                supplied
                    .uri
                    .clone()
                    .unwrap_or_else(|| format!("{}{}", base, self.uri_suffix())),
            ),
            date: Some(
                supplied
                    .date
                    .clone()
                    .unwrap_or_else(|| information.identity_date.clone()),
            ),
            author: Some(supplied.author.clone().unwrap_or_else(|| author.to_string())),
            components,
        }
    }
}

fn paragraph_id(section: &str, key: &str) -> String {
    format!("{}__p_{}", section, key)
}

/// The metadata document of an identity.
///
/// Either built from information and references (which are then kept in
/// their normalized form) or loaded from text, in which case they are
/// recovered with [`IdentityMeta::parse_information_and_references`].
#[derive(Debug, Clone, Default)]
pub struct IdentityMeta {
    tree: DocumentTree,
    information: Option<IdentityInformation>,
    references: Option<References>,
}

impl IdentityMeta {
    /// Builds the document.
    ///
    /// # Errors
    /// - [`IdentityError::MissingRequiredReference`] if `iid`, `iidDIDDoc`
    ///   or `iidIssuer` is absent
    /// - [`IdentityError::InvalidArgument`] if a caller section reuses the
    ///   Identity Information section id, or element ids collide
    pub fn new(information: &IdentityInformation, references: &References) -> Result<Self> {
        if let Some(missing) = REQUIRED_REFERENCES
            .iter()
            .find(|key| !references.contains_key(**key))
        {
            return Err(IdentityError::MissingRequiredReference(format!(
                "needs iid && iidDIDDoc && iidIssuer, missing {}",
                missing
            )));
        }
        if information.additional_body.contains_key(IDENTITY_SECTION_ID) {
            return Err(IdentityError::InvalidArgument(format!(
                "section id '{}' is reserved for identity information",
                IDENTITY_SECTION_ID
            )));
        }

        let references: References = references
            .iter()
            .map(|(key, reference)| (key.clone(), reference.normalized(key)))
            .collect();
        let issuer = &references[IDENTITY_ISSUER];
        let subject = &references[IDENTITY_SUBJECT];
        let issuer_id = issuer.e_id.clone().unwrap_or_default();

        let mut expanded = information.clone();
        for frbr in Frbr::ALL {
            *frbr.of_mut(&mut expanded) = frbr.expand(information, &issuer_id);
        }

        let mut tree = DocumentTree::with_root(ROOT_TAG);
        let root = tree.root().ok_or_else(|| IdentityError::malformed_document("no root"))?;
        let doc = tree.append_element(root, DOC_TAG, &[("name", DOC_NAME)], None)?;
        let meta = tree.append(doc, META_TAG);

        let identification =
            tree.append_element(meta, IDENTIFICATION_TAG, &[("source", issuer_id.as_str())], None)?;
        for frbr in Frbr::ALL {
            write_descriptor(&mut tree, identification, frbr.tag(), frbr.of(&expanded))?;
        }

        let refs_node = tree.append_element(meta, REFERENCES_TAG, &[("source", issuer_id.as_str())], None)?;
        for reference in references.values() {
            write_reference(&mut tree, refs_node, reference)?;
        }

        let title = format!(
            "Identity issued by {} for {}",
            issuer.entity, subject.entity
        );
        let preface = tree.append(doc, PREFACE_TAG);
        let preface_p = tree.append(preface, PARAGRAPH_TAG);
        tree.append_element(preface_p, DOC_TITLE_TAG, &[], Some(title.as_str()))?;

        let main_body = tree.append_element(doc, MAIN_BODY_TAG, &[(EID_ATTRIBUTE, MAIN_BODY_TAG)], None)?;
        let section = open_section(&mut tree, main_body, IDENTITY_SECTION_ID, IDENTITY_SECTION_TITLE)?;
        for (key, reference) in &references {
            let p = tree.append_element(
                section,
                PARAGRAPH_TAG,
                &[(EID_ATTRIBUTE, paragraph_id(IDENTITY_SECTION_ID, key).as_str())],
                None,
            )?;
            tree.append_element(
                p,
                ENTITY_TAG,
                &[
                    (EID_ATTRIBUTE, format!("{}{}", ENTITY_ID_PREFIX, key).as_str()),
                    ("refersTo", reference.e_id.as_deref().unwrap_or_default()),
                ],
                Some(reference.entity.as_str()),
            )?;
        }

        for (section_id, block) in &information.additional_body {
            let section = open_section(&mut tree, main_body, section_id, &block.block_title)?;
            for (key, text) in &block.paragraphs {
                tree.append_element(
                    section,
                    PARAGRAPH_TAG,
                    &[(EID_ATTRIBUTE, paragraph_id(section_id, key).as_str())],
                    Some(text.as_str()),
                )?;
            }
        }

        log::debug!(
            "built identity metadata for {} with {} references",
            information.did,
            references.len()
        );
        Ok(IdentityMeta {
            tree,
            information: Some(expanded),
            references: Some(references),
        })
    }

    /// Loads a document serialized with [`IdentityMeta::finalize`].
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(IdentityMeta {
            tree: DocumentTree::load_from_text(text)?,
            information: None,
            references: None,
        })
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// Information as written into the document, descriptors expanded.
    pub fn information(&self) -> Option<&IdentityInformation> {
        self.information.as_ref()
    }

    /// References as written into the document, defaults filled in.
    pub fn references(&self) -> Option<&References> {
        self.references.as_ref()
    }

    pub fn title(&self) -> Option<&str> {
        let root = self.tree.root()?;
        let title = self
            .tree
            .descend(root, &[DOC_TAG, PREFACE_TAG, PARAGRAPH_TAG, DOC_TITLE_TAG])?;
        self.tree.text(title)
    }

    /// Serializes the document to text.
    pub fn finalize(&self) -> Result<String> {
        self.tree.serialize()
    }

    /// Recovers information and references by walking the document.
    ///
    /// Returns `Ok(None)` when the document has no content.
    pub fn parse_information_and_references(
        &self,
    ) -> Result<Option<(IdentityInformation, References)>> {
        let tree = &self.tree;
        let Some(root) = tree.root() else {
            return Ok(None);
        };
        let identification = tree
            .descend(root, &[DOC_TAG, META_TAG, IDENTIFICATION_TAG])
            .ok_or_else(|| IdentityError::malformed_document("missing identification block"))?;

        let mut information = IdentityInformation::default();
        for frbr in Frbr::ALL {
            let node = tree
                .child(identification, frbr.tag())
                .ok_or_else(|| IdentityError::malformed_document(format!("missing {}", frbr.tag())))?;
            *frbr.of_mut(&mut information) = read_descriptor(tree, node);
        }
        information.identity_date = information
            .frbr_manifestation
            .date
            .clone()
            .ok_or_else(|| IdentityError::malformed_document("missing manifestation date"))?;

        let section = tree
            .find_by_eid(IDENTITY_SECTION_ID)
            .ok_or_else(|| IdentityError::malformed_document("missing identity information section"))?;
        let prefix = paragraph_id(IDENTITY_SECTION_ID, "");
        let mut references = References::new();
        for p in tree.children_tagged(section, PARAGRAPH_TAG) {
            let Some(key) = tree
                .attribute(p, EID_ATTRIBUTE)
                .and_then(|id| id.strip_prefix(prefix.as_str()))
            else {
                continue;
            };
            let Some(entity) = tree.child(p, ENTITY_TAG) else {
                continue;
            };
            let entity_text = tree.text(entity).unwrap_or_default();
            if key == IDENTITY_SUBJECT {
                information.did = entity_text.to_string();
            }
            let Some(refers_to) = tree.attribute(entity, "refersTo") else {
                continue;
            };
            let target = tree.find_by_eid(refers_to).ok_or_else(|| {
                IdentityError::malformed_document(format!("dangling reference '{}'", refers_to))
            })?;
            references.insert(
                key.to_string(),
                Reference {
                    kind: Some(tree.tag(target).to_string()),
                    entity: entity_text.to_string(),
                    e_id: Some(refers_to.to_string()),
                    show_as: tree.attribute(target, "showAs").map(str::to_string),
                    href: tree.attribute(target, "href").map(str::to_string),
                },
            );
        }
        if !references.contains_key(IDENTITY_SUBJECT) {
            return Err(IdentityError::MissingRequiredReference(IDENTITY_SUBJECT.to_string()));
        }

        let main_body = tree
            .find_by_eid(MAIN_BODY_TAG)
            .ok_or_else(|| IdentityError::malformed_document("missing main body"))?;
        for block in tree.children_tagged(main_body, BLOCK_TAG) {
            let Some(section_id) = tree.attribute(block, EID_ATTRIBUTE) else {
                continue;
            };
            if section_id == IDENTITY_SECTION_ID {
                continue;
            }
            information
                .additional_body
                .insert(section_id.to_string(), read_section(tree, block, section_id));
        }

        Ok(Some((information, references)))
    }
}

fn write_descriptor(
    tree: &mut DocumentTree,
    parent: NodeId,
    tag: &str,
    descriptor: &FrbrDescriptor,
) -> Result<()> {
    let node = tree.append(parent, tag);
    if let Some(this) = &descriptor.this {
        tree.append_element(node, "FRBRthis", &[("value", this.as_str())], None)?;
    }
    if let Some(uri) = &descriptor.uri {
        tree.append_element(node, "FRBRuri", &[("value", uri.as_str())], None)?;
    }
    if let Some(date) = &descriptor.date {
        tree.append_element(node, "FRBRdate", &[("date", date.as_str())], None)?;
    }
    if let Some(author) = &descriptor.author {
        tree.append_element(node, "FRBRauthor", &[("href", author.as_str())], None)?;
    }
    let info = tree.append(node, COMPONENT_INFO_TAG);
    for component in &descriptor.components {
        tree.append_element(
            info,
            COMPONENT_DATA_TAG,
            &[
                (EID_ATTRIBUTE, component.e_id.as_str()),
                ("href", component.href.as_str()),
                ("name", component.name.as_str()),
                ("showAs", component.show_as.as_str()),
            ],
            None,
        )?;
    }
    Ok(())
}

fn read_descriptor(tree: &DocumentTree, node: NodeId) -> FrbrDescriptor {
    let attr = |tag: &str, name: &str| {
        tree.child(node, tag)
            .and_then(|child| tree.attribute(child, name))
            .map(str::to_string)
    };
    let components = tree
        .child(node, COMPONENT_INFO_TAG)
        .map(|info| {
            tree.children_tagged(info, COMPONENT_DATA_TAG)
                .map(|c| ComponentData {
                    e_id: tree.attribute(c, EID_ATTRIBUTE).unwrap_or_default().to_string(),
                    href: tree.attribute(c, "href").unwrap_or_default().to_string(),
                    name: tree.attribute(c, "name").unwrap_or_default().to_string(),
                    show_as: tree.attribute(c, "showAs").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    FrbrDescriptor {
        this: attr("FRBRthis", "value"),
        uri: attr("FRBRuri", "value"),
        date: attr("FRBRdate", "date"),
        author: attr("FRBRauthor", "href"),
        components,
    }
}

fn write_reference(tree: &mut DocumentTree, parent: NodeId, reference: &Reference) -> Result<()> {
    let kind = reference.kind.as_deref().unwrap_or_default();
    let node = tree.append(parent, kind);
    if let Some(e_id) = &reference.e_id {
        tree.set_attribute(node, EID_ATTRIBUTE, e_id)?;
    }
    if let Some(href) = &reference.href {
        tree.set_attribute(node, "href", href)?;
    }
    if let Some(show_as) = &reference.show_as {
        tree.set_attribute(node, "showAs", show_as)?;
    }
    Ok(())
}

fn open_section(tree: &mut DocumentTree, main_body: NodeId, id: &str, title: &str) -> Result<NodeId> {
    let section = tree.append_element(main_body, BLOCK_TAG, &[(EID_ATTRIBUTE, id)], None)?;
    tree.append_element(section, HEADING_TAG, &[], Some(title))?;
    Ok(section)
}

fn read_section(tree: &DocumentTree, block: NodeId, section_id: &str) -> BodyBlock {
    let prefix = paragraph_id(section_id, "");
    let block_title = tree
        .child(block, HEADING_TAG)
        .and_then(|h| tree.text(h))
        .unwrap_or_default()
        .to_string();
    let paragraphs: IndexMap<String, String> = tree
        .children_tagged(block, PARAGRAPH_TAG)
        .filter_map(|p| {
            let key = tree.attribute(p, EID_ATTRIBUTE)?.strip_prefix(prefix.as_str())?;
            Some((key.to_string(), tree.text(p).unwrap_or_default().to_string()))
        })
        .collect();
    BodyBlock {
        block_title,
        paragraphs,
    }
}
