//! Path flattening: maps a schema node to its slash-delimited data path.

use super::tree::NodeRef;
use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Slash-delimited sequence of ancestor names, root segment and choice/case
/// wrappers excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatPath(String);

impl FlatPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR).filter(|s| !s.is_empty())
    }

    /// True when `self` equals `prefix` or lies below it. The empty prefix
    /// matches everything.
    pub fn starts_with_path(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_matches(PATH_SEPARATOR);
        if prefix.is_empty() {
            return true;
        }
        match self.0.strip_prefix(prefix) {
            Some("") => true,
            Some(rest) => rest.starts_with(PATH_SEPARATOR),
            None => false,
        }
    }

    fn from_segments(segments: &[&str]) -> Self {
        let mut out = String::new();
        for (i, seg) in segments.iter().enumerate() {
            if i > 0 {
                out.push(PATH_SEPARATOR);
            }
            out.push_str(seg);
        }
        FlatPath(out)
    }
}

impl From<&str> for FlatPath {
    fn from(s: &str) -> Self {
        FlatPath(s.trim_matches(PATH_SEPARATOR).to_string())
    }
}

impl Borrow<str> for FlatPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlatPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the flat path of `node` by following parent links upward.
///
/// Choice and case nodes contribute no segment, however deeply they are
/// nested. Reaching the root marker ends the walk; reaching a parentless
/// node that is not the root drops the outermost segment, which stands for
/// an implicit module wrapper. The walk is bounded by the tree size, so a
/// parent cycle or a dangling parent link is reported instead of looping.
pub fn flatten(node: NodeRef<'_>) -> Result<FlatPath> {
    let tree = node.tree();
    let mut segments: Vec<&str> = Vec::new();
    let mut current = node;

    for _ in 0..tree.len() {
        if current.is_root() {
            segments.reverse();
            return Ok(FlatPath::from_segments(&segments));
        }
        if !current.kind().is_wrapper() {
            segments.push(current.name());
        }
        match current.parent_id() {
            Some(parent) => {
                current = tree.node(parent).ok_or_else(|| {
                    SchemaError::build(
                        tree.unique_name(),
                        format!(
                            "node {:?} references missing parent {}",
                            current.name(),
                            parent.index()
                        ),
                    )
                })?;
            }
            None => {
                segments.reverse();
                let rest = segments.get(1..).unwrap_or(&[]);
                return Ok(FlatPath::from_segments(rest));
            }
        }
    }

    Err(SchemaError::build(
        tree.unique_name(),
        format!("parent cycle reached from node {:?}", node.name()),
    ))
}
