//! Arena-backed schema tree.
//!
//! The tree owns every node in a flat `Vec`. Parent and child links are
//! `NodeId` indices into that arena, so a parent link is an observation
//! handle only and never keeps a node alive.

use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural kind of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Container,
    List,
    Leaf,
    LeafList,
    Choice,
    Case,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Container => "container",
            NodeKind::List => "list",
            NodeKind::Leaf => "leaf",
            NodeKind::LeafList => "leaf-list",
            NodeKind::Choice => "choice",
            NodeKind::Case => "case",
        }
    }

    /// Choice and case nodes group alternatives but never appear in a data path.
    pub fn is_wrapper(&self) -> bool {
        matches!(self, NodeKind::Choice | NodeKind::Case)
    }

    /// Whether nodes of this kind may have children.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::Leaf | NodeKind::LeafList)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a node inside its owning [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A node of a schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub name: String,
    pub kind: NodeKind,
    /// Leaf type name (`string`, `uint16`, ...). `None` for structural nodes.
    pub type_name: Option<String>,
    pub description: Option<String>,
    /// List key leaf names. Empty for non-list nodes.
    pub keys: Vec<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SchemaNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: None,
            description: None,
            keys: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A parsed hierarchical schema. Read-only once handed to the registry.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    unique_name: String,
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    /// Name given to the synthetic root node.
    pub const ROOT_NAME: &'static str = "root";

    /// Create a tree holding only its synthetic root node.
    pub fn new(unique_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            nodes: vec![SchemaNode::new(Self::ROOT_NAME, NodeKind::Root)],
        }
    }

    /// Unique name of the tree, the canonical key of its schema identity.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.nodes.get(id.0).map(|_| NodeRef { tree: self, id })
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: SchemaNode) -> Result<NodeId> {
        let parent_kind = match self.nodes.get(parent.0) {
            Some(p) => p.kind,
            None => {
                return Err(SchemaError::build(
                    &self.unique_name,
                    format!("parent node {} does not exist", parent.0),
                ))
            }
        };
        if parent_kind.is_terminal() {
            return Err(SchemaError::build(
                &self.unique_name,
                format!(
                    "{} {:?} cannot have child {:?}",
                    parent_kind, self.nodes[parent.0].name, node.name
                ),
            ));
        }
        if node.kind == NodeKind::Root {
            return Err(SchemaError::build(
                &self.unique_name,
                format!("node {:?} cannot be a second root", node.name),
            ));
        }

        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Add a node with no parent at all. Such nodes flatten relative to an
    /// implicit module wrapper instead of the root.
    pub fn add_detached(&mut self, mut node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = None;
        node.children.clear();
        self.nodes.push(node);
        id
    }

    /// Iterate every node exactly once, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(move |i| NodeRef {
            tree: self,
            id: NodeId(i),
        })
    }

    /// Overwrite a parent link without any checks. Only used to build
    /// malformed trees in tests.
    #[cfg(test)]
    pub(crate) fn set_parent_unchecked(&mut self, id: NodeId, parent: Option<usize>) {
        self.nodes[id.0].parent = parent.map(NodeId);
    }
}

/// Borrowed view of one node together with its owning tree, so that
/// ancestry can be followed without any ownership edge.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a SchemaTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a SchemaTree {
        self.tree
    }

    pub fn data(&self) -> &'a SchemaNode {
        &self.tree.nodes[self.id.0]
    }

    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn is_root(&self) -> bool {
        self.data().kind == NodeKind::Root
    }

    /// Raw parent link; may dangle in a malformed tree.
    pub fn parent_id(&self) -> Option<NodeId> {
        self.data().parent
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .filter_map(move |id| tree.node(*id))
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id.0)
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
