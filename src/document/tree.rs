// src/document/tree.rs
//! Arena-backed element tree with an `eId` index.
//!
//! Elements live in a flat `Vec` and refer to each other by [`NodeId`].
//! Every `eId` attribute is indexed (with any leading `#` stripped) so that
//! back-links such as `refersTo="#iid"` resolve in constant time.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};
use crate::utils::serialization::{deserialize, serialize};

/// Attribute holding an element's stable id.
pub const EID_ATTRIBUTE: &str = "eId";

/// Index of an element inside a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    text: Option<String>,
    children: Vec<NodeId>,
}

/// Serialized form of an element and its subtree.
#[derive(Serialize, Deserialize)]
struct ElementRepr {
    tag: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    attributes: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<ElementRepr>,
}

/// A document as a tree of elements. The first element is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<Element>,
    index: HashMap<String, NodeId>,
}

fn index_key(e_id: &str) -> &str {
    e_id.trim_start_matches('#')
}

impl DocumentTree {
    /// Creates a tree holding only a root element.
    pub fn with_root(tag: &str) -> Self {
        let mut tree = DocumentTree::default();
        tree.push(tag);
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    fn push(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Appends an empty child element.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.push(tag);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Appends a child element with attributes and optional text.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
        text: Option<&str>,
    ) -> Result<NodeId> {
        let id = self.append(parent, tag);
        for (name, value) in attributes {
            self.set_attribute(id, name, value)?;
        }
        if let Some(text) = text {
            self.set_text(id, text);
        }
        Ok(id)
    }

    /// Sets an attribute. Setting `eId` registers the element in the index.
    ///
    /// # Errors
    /// [`IdentityError::InvalidArgument`] if another element already owns the `eId`.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        if name == EID_ATTRIBUTE {
            let key = index_key(value).to_string();
            match self.index.get(&key) {
                Some(owner) if *owner != node => {
                    return Err(IdentityError::InvalidArgument(format!(
                        "duplicate element id '{}'",
                        value
                    )))
                }
                _ => {}
            }
            if let Some(previous) = self.nodes[node.0].attributes.get(EID_ATTRIBUTE) {
                let previous = index_key(previous).to_string();
                self.index.remove(&previous);
            }
            self.index.insert(key, node);
        }
        self.nodes[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].text = Some(text.to_string());
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attributes.get(name).map(String::as_str)
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].text.as_deref()
    }

    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node.0].children.iter().copied()
    }

    /// First child with the given tag.
    pub fn child(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.children(node).find(|c| self.tag(*c) == tag)
    }

    /// All children with the given tag, in document order.
    pub fn children_tagged<'a>(&'a self, node: NodeId, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.children(node).filter(move |c| self.tag(*c) == tag)
    }

    /// Follows a path of child tags from `node`.
    pub fn descend(&self, node: NodeId, path: &[&str]) -> Option<NodeId> {
        path.iter().try_fold(node, |current, tag| self.child(current, tag))
    }

    /// Looks an element up by `eId`; a leading `#` is ignored.
    pub fn find_by_eid(&self, e_id: &str) -> Option<NodeId> {
        self.index.get(index_key(e_id)).copied()
    }

    fn to_repr(&self, node: NodeId) -> ElementRepr {
        let element = &self.nodes[node.0];
        ElementRepr {
            tag: element.tag.clone(),
            attributes: element.attributes.clone(),
            text: element.text.clone(),
            children: element.children.iter().map(|c| self.to_repr(*c)).collect(),
        }
    }

    fn insert_repr(&mut self, parent: Option<NodeId>, repr: ElementRepr) -> Result<()> {
        let id = match parent {
            Some(parent) => self.append(parent, &repr.tag),
            None => self.push(&repr.tag),
        };
        for (name, value) in &repr.attributes {
            self.set_attribute(id, name, value)?;
        }
        if let Some(text) = &repr.text {
            self.set_text(id, text);
        }
        for child in repr.children {
            self.insert_repr(Some(id), child)?;
        }
        Ok(())
    }

    /// Serializes the tree to text. An empty tree serializes to `null`.
    pub fn serialize(&self) -> Result<String> {
        match self.root() {
            Some(root) => serialize(&self.to_repr(root)),
            None => serialize(&Option::<ElementRepr>::None),
        }
    }

    /// Rebuilds a tree from [`DocumentTree::serialize`] output.
    pub fn load_from_text(text: &str) -> Result<Self> {
        let repr: Option<ElementRepr> = deserialize(text)?;
        let mut tree = DocumentTree::default();
        if let Some(repr) = repr {
            tree.insert_repr(None, repr)?;
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentTree {
        let mut tree = DocumentTree::with_root("doc");
        let root = tree.root().unwrap();
        let refs = tree.append(root, "references");
        tree.append_element(refs, "TLCPerson", &[("eId", "#alice"), ("href", "/alice")], None)
            .unwrap();
        let body = tree.append(root, "body");
        tree.append_element(body, "entity", &[("eId", "e1"), ("refersTo", "#alice")], Some("Alice"))
            .unwrap();
        tree
    }

    #[test]
    fn back_links_resolve_through_the_index() {
        let tree = sample();
        let entity = tree.find_by_eid("e1").unwrap();
        let target = tree.find_by_eid(tree.attribute(entity, "refersTo").unwrap()).unwrap();
        assert_eq!(tree.tag(target), "TLCPerson");
        assert_eq!(tree.attribute(target, "href"), Some("/alice"));
        assert_eq!(tree.find_by_eid("#alice"), tree.find_by_eid("alice"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut tree = sample();
        let root = tree.root().unwrap();
        let err = tree
            .append_element(root, "p", &[("eId", "alice")], None)
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidArgument(_)));
    }

    #[test]
    fn serialization_preserves_structure_and_index() {
        let tree = sample();
        let loaded = DocumentTree::load_from_text(&tree.serialize().unwrap()).unwrap();
        assert_eq!(loaded, tree);
        let root = loaded.root().unwrap();
        let entity = loaded.descend(root, &["body", "entity"]).unwrap();
        assert_eq!(loaded.text(entity), Some("Alice"));
    }

    #[test]
    fn empty_tree_round_trips() {
        let tree = DocumentTree::default();
        let loaded = DocumentTree::load_from_text(&tree.serialize().unwrap()).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.root().is_none());
    }
}
