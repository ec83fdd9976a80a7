//! JSON-RPC 2.0 transport over HTTP.
//!
//! Each operation is a single POST carrying a JSON-RPC request. Servers
//! answer either with a plain JSON body or with an SSE stream, in which case
//! the response is the first `data:` frame carrying our request id. Other
//! frames (keep-alives, notifications) are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::transport::{ToolPage, ToolTransport, TransportError, TransportFactory};
use super::ToolDescriptor;

const METHOD_LIST_TOOLS: &str = "listTools";
const METHOD_CALL_TOOL: &str = "callTool";

/// HTTP client wrapper speaking JSON-RPC 2.0 to one tool server.
pub struct JsonRpcTransport {
    http: reqwest::Client,
    url: String,
}

impl JsonRpcTransport {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = Uuid::new_v4().to_string();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .header(
                reqwest::header::ACCEPT,
                "application/json, text/event-stream",
            )
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::io(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::io(format!("server answered HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_owned();

        let raw = if content_type.starts_with("text/event-stream") {
            read_sse_response(response, &id).await?
        } else {
            response
                .json::<Value>()
                .await
                .map_err(|err| TransportError::malformed(err.to_string()))?
        };

        decode_response(raw, &id)
    }
}

#[async_trait]
impl ToolTransport for JsonRpcTransport {
    async fn list_tools(&self, cursor: Option<String>) -> Result<ToolPage, TransportError> {
        let params = match cursor {
            Some(cursor) => json!({ "cursor": cursor }),
            None => json!({}),
        };
        let result = self.request(METHOD_LIST_TOOLS, params).await?;
        let page: ListToolsResult = serde_json::from_value(result)
            .map_err(|err| TransportError::malformed(format!("invalid tool listing: {err}")))?;
        Ok(ToolPage {
            tools: page.tools,
            next_cursor: page.next_cursor,
        })
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        self.request(
            METHOD_CALL_TOOL,
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Stateless over HTTP, nothing to tear down.
        Ok(())
    }
}

/// Drain an SSE body until a `data:` frame carries our request id.
async fn read_sse_response(
    response: reqwest::Response,
    expected_id: &str,
) -> Result<Value, TransportError> {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| TransportError::io(err.to_string()))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(boundary) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..boundary + 2).collect();
            let data = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect::<Vec<_>>()
                .join("\n");
            if data.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(&data) else {
                continue;
            };
            if value.get("id").and_then(Value::as_str) == Some(expected_id) {
                return Ok(value);
            }
        }
    }

    Err(TransportError::malformed(
        "event stream ended without a response",
    ))
}

fn decode_response(raw: Value, expected_id: &str) -> Result<Value, TransportError> {
    let envelope: RpcEnvelope = serde_json::from_value(raw)
        .map_err(|err| TransportError::malformed(err.to_string()))?;

    if let Some(error) = envelope.error {
        return Err(TransportError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    match &envelope.id {
        Some(Value::String(id)) if id == expected_id => {}
        _ => {
            return Err(TransportError::malformed(
                "response id does not match request",
            ))
        }
    }

    envelope
        .result
        .ok_or_else(|| TransportError::malformed("response carries neither result nor error"))
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Default transport factory: one shared HTTP connection pool, one
/// [`JsonRpcTransport`] per server URL.
#[derive(Clone, Default)]
pub struct JsonRpcFactory {
    http: reqwest::Client,
}

impl JsonRpcFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, custom TLS).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TransportFactory for JsonRpcFactory {
    async fn connect(&self, url: &str) -> Result<Arc<dyn ToolTransport>, TransportError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| TransportError::connect(url, err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::connect(
                url,
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }
        Ok(Arc::new(JsonRpcTransport::new(
            self.http.clone(),
            parsed.to_string(),
        )))
    }
}
