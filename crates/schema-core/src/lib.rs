//! Schema Core - headless schema registry.
//!
//! This crate holds everything the schema server needs that is independent of
//! the network: schema trees, path flattening, the flat path index, and the
//! concurrency-safe registry that serves lookups against them.
//!
//! For the JSON-RPC frontend, see the `schema-rpc` crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use schema_core::{JsonSchemaParser, SchemaIdentity, SchemaRegistry, ServerConfig};
//!
//! fn main() -> schema_core::Result<()> {
//!     let config = ServerConfig::load("config.json".as_ref())?;
//!     let registry = SchemaRegistry::load(&config.schemas, &JsonSchemaParser::new())?;
//!
//!     let id = SchemaIdentity::new("test", "x", "1");
//!     let element = registry.get_element(&id, "interfaces/mtu")?;
//!     println!("{} is a {}", element.path, element.kind);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod identity;
pub mod registry;
pub mod schema;

pub use cancel::{CancellationToken, CancelledError};
pub use config::{
    MetricsConfig, MetricsDefaults, RpcDefaults, RpcServerConfig, SchemaSource, ServerConfig,
    TlsConfig,
};
pub use error::{Result, SchemaError};
pub use identity::SchemaIdentity;
pub use registry::{SchemaEntry, SchemaRegistry};
pub use schema::{
    flatten, FlatPath, JsonSchemaParser, NodeId, NodeKind, NodeRef, SchemaElement, SchemaIndex,
    SchemaNode, SchemaParser, SchemaTree,
};
