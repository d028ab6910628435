//! Serving supervisor: binds the RPC listener, runs the optional metrics
//! endpoint beside it, and coordinates shutdown of both.
//!
//! Lifecycle: [`SchemaServer`] (created) -> [`BoundServer`] (listening, then
//! serving inside [`BoundServer::run`]) -> stopped once `run` returns. Each
//! step consumes the previous one, so a stopped server cannot serve again.

use crate::handlers::{handle_health, handle_rpc};
use crate::metrics::{metrics_router, RpcMetrics};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use schema_core::{
    CancellationToken, MetricsConfig, Result, RpcServerConfig, SchemaError, SchemaRegistry,
    ServerConfig, TlsConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared across handlers.
pub struct AppState {
    /// Registry of loaded schemas
    pub registry: Arc<SchemaRegistry>,
    /// Metrics shared with the exposition endpoint
    pub metrics: Arc<RpcMetrics>,
    /// Per-call deadline
    pub rpc_timeout: Duration,
    /// Largest serialized result a call may return
    pub max_send_msg_size: usize,
    /// Cancelled when the server stops
    pub lifecycle: CancellationToken,
}

/// Build the RPC router: `/rpc` for JSON-RPC calls and `/health`.
///
/// Request bodies are gzip-decoded when needed and capped at
/// `max_recv_msg_size` before they reach the JSON parser.
pub fn rpc_router(state: Arc<AppState>, max_recv_msg_size: usize) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(max_recv_msg_size)),
        )
        .with_state(state)
}

/// Stops a running server. Cloneable, and usable before the server is bound.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    lifecycle: CancellationToken,
}

impl ShutdownHandle {
    /// Stop accepting calls, let in-flight calls finish, and cancel the
    /// shared lifecycle token.
    pub fn stop(&self) {
        if !self.lifecycle.is_cancelled() {
            info!("Stopping schema server");
        }
        self.lifecycle.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_cancelled()
    }
}

/// A configured, not yet listening schema server.
pub struct SchemaServer {
    rpc: RpcServerConfig,
    metrics_config: Option<MetricsConfig>,
    state: Arc<AppState>,
    tls: Option<RustlsConfig>,
}

impl SchemaServer {
    /// Validate `config` and prepare the server around an already populated
    /// registry. TLS material is loaded here so that bad certificates fail
    /// construction rather than the first handshake.
    pub async fn new(config: &ServerConfig, registry: Arc<SchemaRegistry>) -> Result<Self> {
        config.validate()?;

        let metrics = RpcMetrics::new()
            .map_err(|e| SchemaError::Other(format!("Failed to create metrics registry: {}", e)))?;
        metrics.set_schema_count(registry.len());

        let tls = match &config.rpc_server.tls {
            Some(tls) => Some(load_tls(tls).await?),
            None => None,
        };

        let state = Arc::new(AppState {
            registry,
            metrics: Arc::new(metrics),
            rpc_timeout: config.rpc_server.rpc_timeout(),
            max_send_msg_size: config.rpc_server.max_send_msg_size,
            lifecycle: CancellationToken::new(),
        });

        Ok(Self {
            rpc: config.rpc_server.clone(),
            metrics_config: config.metrics.clone(),
            state,
            tls,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            lifecycle: self.state.lifecycle.clone(),
        }
    }

    pub fn metrics(&self) -> Arc<RpcMetrics> {
        self.state.metrics.clone()
    }

    /// Bind the RPC listener and, when configured, the metrics listener.
    ///
    /// Failing to bind the RPC address is a configuration error. Failing to
    /// bind the metrics address is logged and the server runs without it.
    pub async fn bind(self) -> Result<BoundServer> {
        if self.state.lifecycle.is_cancelled() {
            return Err(SchemaError::Transport {
                message: "server was stopped before it started".into(),
                source: None,
            });
        }

        let addr = self.rpc.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SchemaError::config(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        let metrics_listener = match &self.metrics_config {
            Some(metrics) => bind_metrics(metrics).await,
            None => None,
        };

        Ok(BoundServer {
            listener,
            local_addr,
            metrics_listener,
            state: self.state,
            tls: self.tls,
            max_recv_msg_size: self.rpc.max_recv_msg_size,
        })
    }

    /// Bind, then serve until stopped.
    pub async fn serve(self) -> Result<()> {
        self.bind().await?.run().await
    }
}

async fn load_tls(tls: &TlsConfig) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
        .await
        .map_err(|e| {
            SchemaError::config(format!(
                "Invalid TLS material ({}, {}): {}",
                tls.cert_file.display(),
                tls.key_file.display(),
                e
            ))
        })
}

async fn bind_metrics(config: &MetricsConfig) -> Option<(TcpListener, SocketAddr)> {
    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Metrics endpoint disabled: {}", e);
            return None;
        }
    };
    let bound = async {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        std::io::Result::Ok((listener, local))
    };
    match bound.await {
        Ok(bound) => Some(bound),
        Err(e) => {
            error!("Metrics endpoint disabled, failed to bind {}: {}", addr, e);
            None
        }
    }
}

/// A server whose listeners are bound.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    metrics_listener: Option<(TcpListener, SocketAddr)>,
    state: Arc<AppState>,
    tls: Option<RustlsConfig>,
    max_recv_msg_size: usize,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_listener.as_ref().map(|(_, addr)| *addr)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            lifecycle: self.state.lifecycle.clone(),
        }
    }

    /// Serve until [`ShutdownHandle::stop`] is called or the listener fails.
    ///
    /// Returns `Ok` after a requested stop, or a transport error if the
    /// listener halted on its own.
    pub async fn run(self) -> Result<()> {
        let BoundServer {
            listener,
            local_addr,
            metrics_listener,
            state,
            tls,
            max_recv_msg_size,
        } = self;
        let lifecycle = state.lifecycle.clone();

        let metrics_task = metrics_listener.map(|(listener, addr)| {
            info!("Metrics endpoint on {}", addr);
            tokio::spawn(serve_metrics(
                listener,
                metrics_router(state.metrics.clone(), state.registry.clone()),
                lifecycle.clone(),
            ))
        });

        info!(
            "Schema server listening on {} ({}, {} schemas)",
            local_addr,
            if tls.is_some() { "tls" } else { "plaintext" },
            state.registry.len()
        );
        let app = rpc_router(state, max_recv_msg_size);

        let result = match tls {
            None => {
                let token = lifecycle.clone();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await
            }
            Some(tls) => serve_tls(listener, app, tls, lifecycle.clone()).await,
        };

        // The metrics task shares the lifecycle; halting for any reason stops it.
        lifecycle.cancel();
        if let Some(task) = metrics_task {
            if let Err(e) = task.await {
                warn!("Metrics task ended abnormally: {}", e);
            }
        }

        match result {
            Ok(()) => {
                info!("Schema server on {} stopped", local_addr);
                Ok(())
            }
            Err(e) => Err(SchemaError::Transport {
                message: format!("RPC listener on {} failed: {}", local_addr, e),
                source: Some(e),
            }),
        }
    }
}

async fn serve_tls(
    listener: TcpListener,
    app: Router,
    tls: RustlsConfig,
    lifecycle: CancellationToken,
) -> std::io::Result<()> {
    let handle = axum_server::Handle::new();
    let shutdown = {
        let handle = handle.clone();
        tokio::spawn(async move {
            lifecycle.cancelled().await;
            handle.graceful_shutdown(None);
        })
    };

    let listener = listener.into_std()?;
    let result = axum_server::from_tcp_rustls(listener, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await;
    shutdown.abort();
    result
}

async fn serve_metrics(listener: TcpListener, app: Router, lifecycle: CancellationToken) {
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { lifecycle.cancelled().await })
        .await
    {
        error!("Metrics HTTP server stopped: {}", e);
    }
}
