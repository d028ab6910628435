//! Flat path index over a schema tree.

use super::flatten::{flatten, FlatPath};
use super::tree::{NodeId, NodeKind, NodeRef, SchemaTree};
use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Externally visible shape of one schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaElement {
    pub name: String,
    pub path: FlatPath,
    pub kind: NodeKind,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Names of the data-visible children, with choice/case layers expanded.
    #[serde(default)]
    pub children: Vec<String>,
    pub children_count: usize,
    #[serde(skip)]
    node: Option<NodeId>,
}

impl SchemaElement {
    pub fn from_node(node: NodeRef<'_>, path: FlatPath) -> Self {
        let data = node.data();
        let children = materialized_children(node);
        Self {
            name: data.name.clone(),
            path,
            kind: data.kind,
            type_name: data.type_name.clone(),
            description: data.description.clone(),
            keys: data.keys.clone(),
            children_count: children.len(),
            children,
            node: Some(node.id()),
        }
    }

    /// Tree node this element describes. `None` once the element has crossed
    /// the wire.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }
}

/// Child names as they appear in data paths: wrapper children are replaced
/// by their own children, at any depth.
fn materialized_children(node: NodeRef<'_>) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeRef<'_>> = node.children().collect();
    stack.reverse();
    while let Some(child) = stack.pop() {
        if child.kind().is_wrapper() {
            let mut nested: Vec<_> = child.children().collect();
            nested.reverse();
            stack.extend(nested);
        } else {
            out.push(child.name().to_string());
        }
    }
    out
}

/// Mapping from flat path to element descriptor. Built once per tree and
/// replaced wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    elements: HashMap<FlatPath, SchemaElement>,
}

impl SchemaIndex {
    /// Visit every node of `tree` once and index each materializing node
    /// under its flat path.
    ///
    /// Fails on a malformed tree (parent cycle, dangling parent) and when two
    /// nodes claim the same path.
    pub fn build(tree: &SchemaTree) -> Result<Self> {
        let mut elements = HashMap::with_capacity(tree.len());
        for node in tree.iter() {
            let path = flatten(node)?;
            if path.is_empty() || node.kind().is_wrapper() {
                continue;
            }
            let element = SchemaElement::from_node(node, path.clone());
            if let Some(previous) = elements.insert(path.clone(), element) {
                return Err(SchemaError::build(
                    tree.unique_name(),
                    format!(
                        "duplicate path {:?} for {} {:?}",
                        path.as_str(),
                        previous.kind,
                        previous.name
                    ),
                ));
            }
        }
        debug!(
            "Indexed {} elements for schema {}",
            elements.len(),
            tree.unique_name()
        );
        Ok(Self { elements })
    }

    pub fn get(&self, path: &str) -> Option<&SchemaElement> {
        self.elements
            .get(path.trim_matches(super::flatten::PATH_SEPARATOR))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &FlatPath> {
        self.elements.keys()
    }

    /// All indexed paths equal to or below `prefix`, sorted.
    pub fn expand(&self, prefix: &str) -> Vec<FlatPath> {
        let mut out: Vec<FlatPath> = self
            .elements
            .keys()
            .filter(|p| p.starts_with_path(prefix))
            .cloned()
            .collect();
        out.sort();
        out
    }
}
