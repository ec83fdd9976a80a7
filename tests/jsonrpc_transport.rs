//! Exercises [`braidflow::tools::JsonRpcTransport`] against a real HTTP
//! server: a tiny axum handler that speaks enough JSON-RPC to echo request
//! ids, page tool listings, and answer over SSE.

use std::net::SocketAddr;

use axum::extract::Json;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use braidflow::tools::{JsonRpcFactory, ToolBridge, ToolServerConfig, TransportError, TransportFactory};
use braidflow::types::ToolCall;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn rpc_handler(Json(body): Json<Value>) -> Response {
    let id = body["id"].clone();
    let method = body["method"].as_str().unwrap_or_default();
    let params = body["params"].clone();

    let envelope = match method {
        "listTools" => {
            let tools = vec![
                json!({ "name": "alpha" }),
                json!({ "name": "beta", "description": "second tool" }),
                json!({ "name": "gamma" }),
            ];
            let start: usize = params["cursor"]
                .as_str()
                .map_or(0, |cursor| cursor.parse().unwrap_or(0));
            let end = (start + 2).min(tools.len());
            let mut result = json!({ "tools": tools[start..end] });
            if end < tools.len() {
                result["nextCursor"] = json!(end.to_string());
            }
            json!({ "jsonrpc": "2.0", "id": id, "result": result })
        }
        "callTool" if params["name"] == "broken" => {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32000, "message": "tool exploded" },
            })
        }
        "callTool" if params["name"] == "streamed" => {
            let envelope = json!({ "jsonrpc": "2.0", "id": id, "result": { "via": "sse" } });
            let body = format!(": keep-alive\n\ndata: {envelope}\n\n");
            return ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response();
        }
        "callTool" => json!({ "jsonrpc": "2.0", "id": id, "result": { "echo": params } }),
        _ => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": "method not found" },
        }),
    };
    Json(envelope).into_response()
}

async fn spawn_rpc_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let router = Router::new().route("/", post(rpc_handler));
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    addr
}

#[tokio::test]
async fn bridge_initializes_over_live_json_rpc() {
    let addr = spawn_rpc_server().await;
    let config = ToolServerConfig::new().with_server("local", format!("http://{addr}/"));

    let mut bridge = ToolBridge::json_rpc();
    let count = bridge.initialize(&config).await.unwrap();

    // Three tools across two listing pages.
    assert_eq!(count, 3);
    let names: Vec<String> = bridge
        .descriptors()
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);

    let result = bridge
        .execute_tool(
            &ToolCall::with_id("c1", "alpha", json!({ "q": "zebra" })),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        result.result,
        json!({ "echo": { "name": "alpha", "arguments": { "q": "zebra" } } })
    );
}

#[tokio::test]
async fn rpc_error_objects_become_typed_errors() {
    let addr = spawn_rpc_server().await;
    let factory = JsonRpcFactory::new();
    let transport = factory.connect(&format!("http://{addr}/")).await.unwrap();

    let failure = transport.call_tool("broken", json!({})).await.unwrap_err();

    match failure {
        TransportError::Rpc { code, message } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "tool exploded");
        }
        other => panic!("expected an rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn sse_answers_resolve_to_their_request() {
    let addr = spawn_rpc_server().await;
    let factory = JsonRpcFactory::new();
    let transport = factory.connect(&format!("http://{addr}/")).await.unwrap();

    let result = transport.call_tool("streamed", json!({})).await.unwrap();

    assert_eq!(result, json!({ "via": "sse" }));
}

#[tokio::test]
async fn non_success_statuses_are_io_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(503);
        })
        .await;
    let factory = JsonRpcFactory::new();
    let transport = factory.connect(&server.base_url()).await.unwrap();

    let failure = transport.call_tool("anything", json!({})).await.unwrap_err();

    assert!(matches!(failure, TransportError::Io { .. }));
    assert!(failure.to_string().contains("503"));
}

#[tokio::test]
async fn mismatched_response_ids_are_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(json!({ "jsonrpc": "2.0", "id": "someone-else", "result": {} }));
        })
        .await;
    let factory = JsonRpcFactory::new();
    let transport = factory.connect(&server.base_url()).await.unwrap();

    let failure = transport.call_tool("anything", json!({})).await.unwrap_err();

    assert!(matches!(failure, TransportError::Malformed { .. }));
    assert!(failure.to_string().contains("does not match"));
}

#[tokio::test]
async fn garbage_bodies_are_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).body("this is not json");
        })
        .await;
    let factory = JsonRpcFactory::new();
    let transport = factory.connect(&server.base_url()).await.unwrap();

    let failure = transport
        .list_tools(None)
        .await
        .unwrap_err();

    assert!(matches!(failure, TransportError::Malformed { .. }));
}

#[tokio::test]
async fn non_http_schemes_are_refused() {
    let factory = JsonRpcFactory::new();

    let failure = factory
        .connect("ftp://tools.example/rpc")
        .await
        .err()
        .unwrap();

    assert!(matches!(failure, TransportError::Connect { .. }));
    assert!(failure.to_string().contains("unsupported scheme"));
}
