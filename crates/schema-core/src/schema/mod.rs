//! Schema trees and their flat path index.
//!
//! A [`SchemaTree`] is produced by a [`SchemaParser`], flattened node by node
//! with [`flatten`], and indexed into a [`SchemaIndex`] keyed by [`FlatPath`].

pub mod flatten;
pub mod index;
pub mod parser;
pub mod tree;

pub use flatten::{flatten, FlatPath, PATH_SEPARATOR};
pub use index::{SchemaElement, SchemaIndex};
pub use parser::{JsonSchemaParser, SchemaParser};
pub use tree::{NodeId, NodeKind, NodeRef, SchemaNode, SchemaTree};
