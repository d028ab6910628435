//! Prometheus metrics for the RPC frontend and their HTTP exposition.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, Encoder, HistogramVec, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use schema_core::{MetricsDefaults, SchemaRegistry};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::error;

/// Per-server metrics registry shared by the RPC frontend and the exposition
/// endpoint.
#[derive(Debug)]
pub struct RpcMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
    schemas: IntGauge,
}

impl RpcMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = register_int_counter_vec_with_registry!(
            "schema_rpc_requests_total",
            "RPC calls handled, by method and outcome",
            &["method", "outcome"],
            registry
        )?;
        let latency = register_histogram_vec_with_registry!(
            "schema_rpc_request_duration_seconds",
            "RPC call latency",
            &["method"],
            vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0],
            registry
        )?;
        let schemas = register_int_gauge_with_registry!(
            "schema_registry_schemas",
            "Schemas currently registered",
            registry
        )?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests,
            latency,
            schemas,
        })
    }

    /// Record one finished call.
    pub fn observe(&self, method: &str, outcome: &str, elapsed: Duration) {
        self.requests.with_label_values(&[method, outcome]).inc();
        self.latency
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn set_schema_count(&self, count: usize) {
        self.schemas.set(count as i64);
    }

    pub fn request_count(&self, method: &str, outcome: &str) -> u64 {
        self.requests.with_label_values(&[method, outcome]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric family in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[derive(Clone)]
struct MetricsState {
    metrics: Arc<RpcMetrics>,
    registry: Arc<SchemaRegistry>,
}

async fn handle_metrics(State(state): State<MetricsState>) -> Response {
    // The registry can change after startup; sample it on every scrape.
    state.metrics.set_schema_count(state.registry.len());
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Router serving the metrics snapshot for `registry`.
pub fn metrics_router(metrics: Arc<RpcMetrics>, registry: Arc<SchemaRegistry>) -> Router {
    Router::new()
        .route(MetricsDefaults::PATH, get(handle_metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            MetricsDefaults::READ_TIMEOUT,
        ))
        .with_state(MetricsState { metrics, registry })
}
