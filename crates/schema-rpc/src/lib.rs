//! Schema RPC - JSON-RPC frontend for the schema registry.
//!
//! Serves lookups against a [`schema_core::SchemaRegistry`] over HTTP
//! (`POST /rpc`, `GET /health`), with an optional Prometheus endpoint beside
//! it. [`SchemaClient`] is the matching typed client.

pub mod client;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod wrapper;

pub use client::SchemaClient;
pub use handlers::SchemaDetails;
pub use metrics::RpcMetrics;
pub use server::{AppState, BoundServer, SchemaServer, ShutdownHandle};
