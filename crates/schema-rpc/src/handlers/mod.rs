//! JSON-RPC request handlers.

mod schema;
mod shared;

pub use schema::SchemaDetails;

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use schema_core::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;

/// Methods served by [`dispatch_method`]; anything else is recorded under
/// `unknown` to keep metric label cardinality bounded.
const METHODS: &[&str] = &[
    "get_schema_element",
    "list_schemas",
    "get_schema_details",
    "expand_path",
];

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
///
/// The body arrives as raw bytes so that the size limit applies before any
/// deserialization and malformed JSON maps to a JSON-RPC parse error.
pub async fn handle_rpc(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected malformed RPC request: {}", e);
            return (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                )),
            );
        }
    };

    let method = request.method.as_str();
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id;

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    let label = if METHODS.contains(&method) { method } else { "unknown" };
    let started = Instant::now();
    let result = with_deadline(state.rpc_timeout, dispatch_method(&state, method, &params))
        .await
        .map(|value| wrap_response(method, value))
        .and_then(|value| check_response_size(value, state.max_send_msg_size));

    let outcome = match &result {
        Ok(_) => "ok",
        Err(Dispatch::MethodNotFound) => "method_not_found",
        Err(Dispatch::Failed(e)) => e.outcome(),
    };
    state.metrics.observe(label, outcome, started.elapsed());

    match result {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(Dispatch::MethodNotFound) => {
            warn!("Method not found: {}", method);
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                )),
            )
        }
        Err(Dispatch::Failed(e)) => {
            if e.is_not_found() {
                debug!("RPC {} not found: {}", method, e);
            } else {
                error!("RPC error for {}: {}", method, e);
            }
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, e.to_rpc_error_code(), e.to_string())),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Failure of one dispatched call.
#[derive(Debug)]
pub(crate) enum Dispatch {
    MethodNotFound,
    Failed(SchemaError),
}

impl From<SchemaError> for Dispatch {
    fn from(err: SchemaError) -> Self {
        Dispatch::Failed(err)
    }
}

/// Run one call under its deadline. On expiry the call future is dropped, so
/// nothing keeps running on behalf of the caller.
pub(crate) async fn with_deadline<F>(deadline: Duration, call: F) -> Result<Value, Dispatch>
where
    F: Future<Output = Result<Value, Dispatch>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(Dispatch::Failed(SchemaError::Timeout(deadline))),
    }
}

fn check_response_size(value: Value, limit: usize) -> Result<Value, Dispatch> {
    let size = serde_json::to_vec(&value)
        .map_err(SchemaError::from)?
        .len();
    if size > limit {
        return Err(SchemaError::MessageTooLarge { size, limit }.into());
    }
    Ok(value)
}

/// Dispatch a method call to the appropriate handler.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> Result<Value, Dispatch> {
    state.lifecycle.check().map_err(SchemaError::from)?;

    let result = match method {
        "get_schema_element" => schema::get_schema_element(state, params).await,
        "list_schemas" => schema::list_schemas(state, params).await,
        "get_schema_details" => schema::get_schema_details(state, params).await,
        "expand_path" => schema::expand_path(state, params).await,
        _ => return Err(Dispatch::MethodNotFound),
    };
    Ok(result?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RpcMetrics;
    use schema_core::{
        CancellationToken, NodeKind, SchemaIdentity, SchemaIndex, SchemaNode, SchemaRegistry,
        SchemaTree,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    fn test_state() -> AppState {
        let registry = SchemaRegistry::new();
        let id = SchemaIdentity::new("test", "x", "1");
        let mut tree = SchemaTree::new(id.key());
        let root = tree.root();
        let ifaces = tree
            .add_child(root, SchemaNode::new("interfaces", NodeKind::Container))
            .unwrap();
        let choice = tree
            .add_child(ifaces, SchemaNode::new("type", NodeKind::Choice))
            .unwrap();
        let case = tree
            .add_child(choice, SchemaNode::new("ethernet", NodeKind::Case))
            .unwrap();
        tree.add_child(case, SchemaNode::new("mtu", NodeKind::Leaf).with_type("uint16")).unwrap();
        let index = SchemaIndex::build(&tree).unwrap();
        registry.put(id, tree, index).unwrap();

        AppState {
            registry: Arc::new(registry),
            metrics: Arc::new(RpcMetrics::new().unwrap()),
            rpc_timeout: Duration::from_secs(5),
            max_send_msg_size: 1024 * 1024,
            lifecycle: CancellationToken::new(),
        }
    }

    fn identity_params(path: &str) -> Value {
        json!({"name": "test", "vendor": "x", "version": "1", "path": path})
    }

    #[test]
    fn test_json_rpc_response_success() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"data": "test"}));
        assert!(response.error.is_none());
        assert!(response.result.is_some());
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response = JsonRpcResponse::error(Some(json!(1)), -32600, "Test error".into());
        assert!(response.error.is_some());
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_dispatch_get_schema_element() {
        let state = test_state();
        let value = dispatch_method(
            &state,
            "get_schema_element",
            &identity_params("interfaces/mtu"),
        )
        .await
        .unwrap();
        assert_eq!(value["name"], "mtu");
        assert_eq!(value["type"], "uint16");
        assert_eq!(value["kind"], "leaf");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_identity_is_not_found() {
        let state = test_state();
        let params = json!({"name": "other", "vendor": "x", "version": "1", "path": "interfaces/mtu"});
        match dispatch_method(&state, "get_schema_element", &params).await {
            Err(Dispatch::Failed(e)) => assert_eq!(e.to_rpc_error_code(), -32001),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let state = test_state();
        let result = dispatch_method(&state, "drop_tables", &json!({})).await;
        assert!(matches!(result, Err(Dispatch::MethodNotFound)));
    }

    #[tokio::test]
    async fn test_dispatch_rejected_after_shutdown() {
        let state = test_state();
        state.lifecycle.cancel();
        let result = dispatch_method(&state, "list_schemas", &json!({})).await;
        assert!(matches!(result, Err(Dispatch::Failed(SchemaError::Transport { .. }))));
    }

    #[tokio::test]
    async fn test_expand_and_details() {
        let state = test_state();
        let paths = dispatch_method(&state, "expand_path", &identity_params(""))
            .await
            .unwrap();
        assert_eq!(paths, json!(["interfaces", "interfaces/mtu"]));

        let details = dispatch_method(&state, "get_schema_details", &identity_params(""))
            .await
            .unwrap();
        assert_eq!(details["element_count"], 2);
        assert_eq!(details["root_children"], json!(["interfaces"]));

        let missing = dispatch_method(&state, "expand_path", &identity_params("system")).await;
        assert!(matches!(missing, Err(Dispatch::Failed(SchemaError::PathNotFound { .. }))));
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_deadline_times_out_and_drops_call() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());
        let slow = async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!(null))
        };

        let result = with_deadline(Duration::from_millis(20), slow).await;
        match result {
            Err(Dispatch::Failed(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_response_size_cap() {
        let value = json!({"blob": "x".repeat(128)});
        assert!(check_response_size(value.clone(), 1024).is_ok());
        assert!(matches!(
            check_response_size(value, 16),
            Err(Dispatch::Failed(SchemaError::MessageTooLarge { .. }))
        ));
    }
}
