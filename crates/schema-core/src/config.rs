//! Server configuration.
//!
//! Defaults live as associated constants on [`RpcDefaults`]; the runtime
//! configuration is deserialized from a JSON file and validated before any
//! schema is loaded.

use crate::error::{Result, SchemaError};
use crate::identity::SchemaIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default values for the RPC listener.
pub struct RpcDefaults;

impl RpcDefaults {
    pub const ADDRESS: &'static str = "0.0.0.0:55000";
    pub const MAX_RECV_MSG_SIZE: usize = 25_165_824; // 24MB
    pub const MAX_SEND_MSG_SIZE: usize = 25_165_824;
    pub const RPC_TIMEOUT_MS: u64 = 60_000;
    pub const CLIENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Default values for the metrics exposition endpoint.
pub struct MetricsDefaults;

impl MetricsDefaults {
    pub const ADDRESS: &'static str = "0.0.0.0:56090";
    pub const PATH: &'static str = "/metrics";
    pub const READ_TIMEOUT: Duration = Duration::from_secs(60);
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub rpc_server: RpcServerConfig,
    /// Metrics exposition; disabled when absent.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub schemas: Vec<SchemaSource>,
}

/// RPC listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_max_recv")]
    pub max_recv_msg_size: usize,
    #[serde(default = "default_max_send")]
    pub max_send_msg_size: usize,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Transport encryption; the listener runs in plaintext when absent.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_recv_msg_size: default_max_recv(),
            max_send_msg_size: default_max_send(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            tls: None,
        }
    }
}

impl RpcServerConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("rpc_server.address", &self.address)
    }
}

/// PEM certificate and key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Metrics exposition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
        }
    }
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("metrics.address", &self.address)
    }
}

/// One configured schema: its identity and the files handed to the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSource {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub files: Vec<PathBuf>,
}

impl SchemaSource {
    pub fn identity(&self) -> SchemaIdentity {
        SchemaIdentity::new(&self.name, &self.vendor, &self.version)
    }
}

fn default_address() -> String {
    RpcDefaults::ADDRESS.to_string()
}

fn default_max_recv() -> usize {
    RpcDefaults::MAX_RECV_MSG_SIZE
}

fn default_max_send() -> usize {
    RpcDefaults::MAX_SEND_MSG_SIZE
}

fn default_rpc_timeout_ms() -> u64 {
    RpcDefaults::RPC_TIMEOUT_MS
}

fn default_metrics_address() -> String {
    MetricsDefaults::ADDRESS.to_string()
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| SchemaError::config(format!("invalid {} {:?}: {}", field, value, e)))
}

impl ServerConfig {
    /// Read, resolve and validate a JSON configuration file.
    ///
    /// Relative schema file paths are resolved against the directory that
    /// contains the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SchemaError::io_with_path(e, path))?;
        let mut config: ServerConfig = serde_json::from_str(&raw).map_err(|e| {
            SchemaError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for schema in &mut self.schemas {
            schema.files.iter_mut().for_each(resolve);
        }
        if let Some(tls) = &mut self.rpc_server.tls {
            resolve(&mut tls.cert_file);
            resolve(&mut tls.key_file);
        }
    }

    /// Check every field that would otherwise fail late, at bind or load time.
    pub fn validate(&self) -> Result<()> {
        let rpc = &self.rpc_server;
        rpc.socket_addr()?;
        if rpc.max_recv_msg_size == 0 || rpc.max_send_msg_size == 0 {
            return Err(SchemaError::config("message size limits must be non-zero"));
        }
        if rpc.rpc_timeout_ms == 0 {
            return Err(SchemaError::config("rpc_timeout_ms must be non-zero"));
        }
        if let Some(tls) = &rpc.tls {
            for file in [&tls.cert_file, &tls.key_file] {
                if !file.is_file() {
                    return Err(SchemaError::config(format!(
                        "TLS file not found: {}",
                        file.display()
                    )));
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.socket_addr()?;
        }

        let mut seen = HashSet::new();
        for schema in &self.schemas {
            let identity = schema.identity();
            identity.validate()?;
            if schema.files.is_empty() {
                return Err(SchemaError::config(format!(
                    "schema {} lists no files",
                    identity
                )));
            }
            if !seen.insert(identity.key()) {
                return Err(SchemaError::config(format!(
                    "schema {} configured more than once",
                    identity
                )));
            }
        }
        Ok(())
    }
}
