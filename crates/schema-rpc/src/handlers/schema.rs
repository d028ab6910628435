//! Schema lookup handlers.

use super::shared::{get_str_param, require_identity, require_str_param};
use crate::server::AppState;
use schema_core::SchemaIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of one registered schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDetails {
    pub identity: SchemaIdentity,
    pub node_count: usize,
    pub element_count: usize,
    /// Data-visible top-level element names.
    pub root_children: Vec<String>,
}

pub async fn get_schema_element(state: &AppState, params: &Value) -> schema_core::Result<Value> {
    let identity = require_identity(params)?;
    let path = require_str_param(params, "path", "path")?;
    let element = state.registry.get_element(&identity, &path)?;
    Ok(serde_json::to_value(element)?)
}

pub async fn list_schemas(state: &AppState, _params: &Value) -> schema_core::Result<Value> {
    let identities = state.registry.list()?;
    Ok(serde_json::to_value(identities)?)
}

pub async fn get_schema_details(state: &AppState, params: &Value) -> schema_core::Result<Value> {
    let identity = require_identity(params)?;
    let entry = state.registry.get(&identity)?;
    let mut root_children: Vec<String> = entry
        .index
        .paths()
        .filter(|p| p.segments().count() == 1)
        .map(|p| p.to_string())
        .collect();
    root_children.sort();

    let details = SchemaDetails {
        identity: entry.identity.clone(),
        node_count: entry.tree.len(),
        element_count: entry.index.len(),
        root_children,
    };
    Ok(serde_json::to_value(details)?)
}

pub async fn expand_path(state: &AppState, params: &Value) -> schema_core::Result<Value> {
    let identity = require_identity(params)?;
    let prefix = get_str_param(params, "path", "path").unwrap_or_default();
    let entry = state.registry.get(&identity)?;
    if !prefix.trim_matches('/').is_empty() {
        entry.element(prefix)?;
    }
    Ok(serde_json::to_value(entry.index.expand(prefix))?)
}
