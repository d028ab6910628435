//! Error types for the schema registry.
//!
//! Startup errors (configuration, schema build) abort construction. Per-call
//! errors (not found, timeout, oversized messages) are recoverable and map to
//! JSON-RPC error codes at the frontend.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for schema registry operations.
#[derive(Debug, Error)]
pub enum SchemaError {
    // Startup errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Schema {schema} build failed: {message}")]
    SchemaBuild { schema: String, message: String },

    // Lookup errors
    #[error("Schema not found: {identity}")]
    SchemaNotFound { identity: String },

    #[error("Path not found in schema {identity}: {path}")]
    PathNotFound { identity: String, path: String },

    // Per-call enforcement
    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Message too large: {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Error reported by a remote schema server.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for schema registry operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

impl From<std::io::Error> for SchemaError {
    fn from(err: std::io::Error) -> Self {
        SchemaError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SchemaError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SchemaError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        SchemaError::Config {
            message: message.into(),
        }
    }

    /// Create a schema build error for the named schema.
    pub fn build(schema: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::SchemaBuild {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Application-defined codes:
    /// - -32001: Schema not found
    /// - -32002: Path not found
    /// - -32003: Deadline exceeded
    /// - -32004: Message too large
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            SchemaError::SchemaNotFound { .. } => -32001,
            SchemaError::PathNotFound { .. } => -32002,
            SchemaError::Timeout(_) => -32003,
            SchemaError::MessageTooLarge { .. } => -32004,
            SchemaError::InvalidParams { .. } => -32602,
            SchemaError::Rpc { code, .. } => *code,
            _ => -32603,
        }
    }

    /// True for the "not found" family surfaced to callers.
    pub fn is_not_found(&self) -> bool {
        match self {
            SchemaError::SchemaNotFound { .. } | SchemaError::PathNotFound { .. } => true,
            SchemaError::Rpc { code, .. } => matches!(code, -32001 | -32002),
            _ => false,
        }
    }

    /// True when the call was aborted by its deadline, locally or remotely.
    pub fn is_timeout(&self) -> bool {
        match self {
            SchemaError::Timeout(_) => true,
            SchemaError::Rpc { code, .. } => *code == -32003,
            _ => false,
        }
    }

    /// Short label used as the `outcome` dimension of request metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            SchemaError::SchemaNotFound { .. } | SchemaError::PathNotFound { .. } => "not_found",
            SchemaError::Timeout(_) => "timeout",
            SchemaError::MessageTooLarge { .. } => "too_large",
            SchemaError::InvalidParams { .. } => "invalid_params",
            _ => "internal",
        }
    }
}
