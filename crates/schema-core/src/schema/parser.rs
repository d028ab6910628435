//! Schema source parsing.
//!
//! The registry only depends on the [`SchemaParser`] trait. The bundled
//! [`JsonSchemaParser`] reads module files of the form
//!
//! ```json
//! {"module": "interfaces", "children": [
//!   {"name": "interfaces", "kind": "container", "children": [
//!     {"name": "mtu", "kind": "leaf", "type": "uint16"}
//!   ]}
//! ]}
//! ```
//!
//! Top-level children of every module of one schema are merged under a single
//! synthetic root node.

use super::tree::{NodeId, NodeKind, SchemaNode, SchemaTree};
use crate::config::SchemaSource;
use crate::error::{Result, SchemaError};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Turns a configured schema source into a tree.
pub trait SchemaParser: Send + Sync {
    fn parse(&self, source: &SchemaSource) -> Result<SchemaTree>;
}

#[derive(Debug, Deserialize)]
struct ModuleDoc {
    module: String,
    #[serde(default)]
    children: Vec<NodeDoc>,
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    name: String,
    kind: NodeKind,
    #[serde(rename = "type", default)]
    type_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    children: Vec<NodeDoc>,
}

impl NodeDoc {
    fn to_node(&self) -> SchemaNode {
        let mut node = SchemaNode::new(&self.name, self.kind).with_keys(self.keys.clone());
        node.type_name = self.type_name.clone();
        node.description = self.description.clone();
        node
    }
}

/// Parser for JSON module files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaParser;

impl JsonSchemaParser {
    pub fn new() -> Self {
        Self
    }

    fn read_module(&self, schema: &str, path: &Path) -> Result<ModuleDoc> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SchemaError::build(schema, format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            SchemaError::build(schema, format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Attach `docs` and all of their descendants under `parent`.
    fn insert_all(tree: &mut SchemaTree, parent: NodeId, docs: &[NodeDoc]) -> Result<()> {
        let mut stack: Vec<(NodeId, &NodeDoc)> = docs.iter().rev().map(|d| (parent, d)).collect();
        while let Some((parent, doc)) = stack.pop() {
            if doc.kind == NodeKind::Root {
                return Err(SchemaError::build(
                    tree.unique_name(),
                    format!("node {:?} cannot declare kind root", doc.name),
                ));
            }
            let id = tree.add_child(parent, doc.to_node())?;
            stack.extend(doc.children.iter().rev().map(|c| (id, c)));
        }
        Ok(())
    }
}

impl SchemaParser for JsonSchemaParser {
    fn parse(&self, source: &SchemaSource) -> Result<SchemaTree> {
        let key = source.identity().key();
        let mut tree = SchemaTree::new(&key);
        let root = tree.root();
        for file in &source.files {
            let module = self.read_module(&key, file)?;
            debug!(
                "Parsed module {} ({} top-level nodes) for schema {}",
                module.module,
                module.children.len(),
                key
            );
            Self::insert_all(&mut tree, root, &module.children)?;
        }
        Ok(tree)
    }
}
