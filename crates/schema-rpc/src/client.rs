//! Client bootstrap for the schema server.

use crate::handlers::{JsonRpcRequest, JsonRpcResponse, SchemaDetails};
use crate::wrapper::response_key;
use schema_core::{FlatPath, Result, RpcDefaults, SchemaElement, SchemaError, SchemaIdentity};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Typed JSON-RPC client for one schema server.
#[derive(Debug)]
pub struct SchemaClient {
    http: reqwest::Client,
    base_url: String,
    max_recv_msg_size: usize,
    next_id: AtomicU64,
}

fn transport(message: impl Into<String>) -> SchemaError {
    SchemaError::Transport {
        message: message.into(),
        source: None,
    }
}

impl SchemaClient {
    /// Connect to the server at `addr` (`host:port` or a full `http(s)://` URL).
    ///
    /// Returns once the server answers its health check, or fails after the
    /// connection-establishment timeout.
    pub async fn connect(addr: &str, max_recv_msg_size: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(RpcDefaults::CLIENT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| transport(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr)
        };

        let response = http
            .get(format!("{}/health", base_url))
            .timeout(RpcDefaults::CLIENT_CONNECT_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport(format!("Failed to connect to {}: {}", base_url, e)))?;
        if !response.status().is_success() {
            return Err(transport(format!(
                "Health check against {} returned {}",
                base_url,
                response.status()
            )));
        }
        debug!("Connected to schema server at {}", base_url);

        Ok(Self {
            http,
            base_url,
            max_recv_msg_size,
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one call and return its unwrapped result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
            id: Some(json!(self.next_id.fetch_add(1, Ordering::Relaxed))),
        };

        let mut response = self
            .http
            .post(format!("{}/rpc", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport(format!("{} failed: {}", method, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
            return Err(transport(format!(
                "{} request rejected by server as too large",
                method
            )));
        }
        if !status.is_success() {
            return Err(transport(format!("{} returned HTTP {}", method, status)));
        }

        let limit = self.max_recv_msg_size;
        if let Some(declared) = response.content_length() {
            if declared > limit as u64 {
                return Err(SchemaError::MessageTooLarge {
                    size: usize::try_from(declared).unwrap_or(usize::MAX),
                    limit,
                });
            }
        }

        // Decoded bodies carry no usable length up front, so the cap also
        // applies while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport(format!("{} response read failed: {}", method, e)))?
        {
            if body.len() + chunk.len() > limit {
                return Err(SchemaError::MessageTooLarge {
                    size: body.len() + chunk.len(),
                    limit,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let response: JsonRpcResponse = serde_json::from_slice(&body)?;
        if let Some(error) = response.error {
            return Err(SchemaError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let mut result = response.result.unwrap_or(Value::Null);
        Ok(match response_key(method) {
            Some(key) => result.get_mut(key).map(Value::take).unwrap_or(Value::Null),
            None => result,
        })
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_schema_element(
        &self,
        identity: &SchemaIdentity,
        path: &str,
    ) -> Result<SchemaElement> {
        self.call_typed("get_schema_element", identity_params(identity, Some(path))).await
    }

    pub async fn list_schemas(&self) -> Result<Vec<SchemaIdentity>> {
        self.call_typed("list_schemas", json!({})).await
    }

    pub async fn get_schema_details(&self, identity: &SchemaIdentity) -> Result<SchemaDetails> {
        self.call_typed("get_schema_details", identity_params(identity, None)).await
    }

    pub async fn expand_path(
        &self,
        identity: &SchemaIdentity,
        path: &str,
    ) -> Result<Vec<FlatPath>> {
        self.call_typed("expand_path", identity_params(identity, Some(path))).await
    }
}

fn identity_params(identity: &SchemaIdentity, path: Option<&str>) -> Value {
    let mut params = json!({
        "name": identity.name,
        "vendor": identity.vendor,
        "version": identity.version,
    });
    if let Some(path) = path {
        params["path"] = json!(path);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_params() {
        let id = SchemaIdentity::new("test", "x", "1");
        let params = identity_params(&id, Some("interfaces/mtu"));
        assert_eq!(params["name"], "test");
        assert_eq!(params["path"], "interfaces/mtu");
        assert!(identity_params(&id, None).get("path").is_none());
    }

    #[tokio::test]
    async fn test_connect_refused_fails() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = SchemaClient::connect(&format!("127.0.0.1:{}", port), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Transport { .. }));
    }

    /// Minimal HTTP/1.1 peer: healthy, but answers every RPC with a header
    /// announcing `rpc_body_len` bytes and then stalls without sending them.
    async fn stalling_server(rpc_body_len: u64) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        let head = &buf[..n];
                        let reply = if head.starts_with(b"GET /health") {
                            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                             content-length: 15\r\n\r\n{\"status\":\"ok\"}"
                                .to_string()
                        } else if head.starts_with(b"POST /rpc") {
                            format!(
                                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                                 content-length: {}\r\n\r\n{{",
                                rpc_body_len
                            )
                        } else {
                            continue;
                        };
                        if socket.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_declared_oversized_body_rejected_before_reading() {
        let addr = stalling_server(64 * 1024 * 1024).await;
        let client = SchemaClient::connect(&addr.to_string(), 1024).await.unwrap();

        // The body never arrives, so only the declared length can end this call.
        let err = tokio::time::timeout(std::time::Duration::from_secs(5), client.list_schemas())
            .await
            .expect("oversized response should be rejected without reading it")
            .unwrap_err();
        match err {
            SchemaError::MessageTooLarge { size, limit } => {
                assert_eq!(size, 64 * 1024 * 1024);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected MessageTooLarge, got {:?}", other),
        }
    }
}
