//! Example: Embedding the gateway with a custom capability set.
//!
//! Builds a catalog with one tool and one resource, assembles the router,
//! and drives a full Streamable session in process, no listener needed.
//!
//! Usage:
//!   cargo run --example static_gateway

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use flowgate::types::{ResourceContent, ResourceDefinition, ToolCallResult, ToolDefinition};
use flowgate::StaticCatalog;
use flowgate_http::{build_router, AppState, ServerConfig};

const SESSION_HEADER: &str = "mcp-session-id";

/// POST one message to the Streamable endpoint with a JSON preference.
async fn post(
    router: &Router,
    session: Option<&str>,
    body: Value,
) -> (StatusCode, Option<String>, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/streamable")
        .header("content-type", "application/json")
        .header("accept", "application/json");
    if let Some(id) = session {
        request = request.header(SESSION_HEADER, id);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, session, value)
}

#[tokio::main]
async fn main() {
    println!("=== Flowgate embedding example ===\n");

    // Build a catalog: one tool, one resource.
    let catalog = StaticCatalog::new()
        .tool(
            ToolDefinition {
                name: "shout".to_string(),
                description: Some("Uppercase the provided text".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": { "text": {"type": "string"} },
                    "required": ["text"]
                }),
            },
            |arguments| async move {
                let text = arguments
                    .and_then(|args| {
                        args.get("text").and_then(Value::as_str).map(str::to_uppercase)
                    })
                    .unwrap_or_default();
                Ok(ToolCallResult::text(text))
            },
        )
        .resource(
            ResourceDefinition {
                uri: "demo://motd".to_string(),
                name: "Message of the day".to_string(),
                description: None,
                mime_type: Some("text/plain".to_string()),
            },
            ResourceContent::text("demo://motd", "All systems nominal"),
        );

    // Assemble the router the binary would serve.
    let state = AppState::new(
        &ServerConfig::default(),
        Arc::new(catalog),
        CancellationToken::new(),
    );
    let router = build_router(state);

    // 1. Initialize: no session header on the first call.
    println!("1. Initializing...");
    let (status, session, body) = post(
        &router,
        None,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "example-client", "version": "1.0.0"}
            }
        }),
    )
    .await;
    let session = session.expect("initialize sets the session header");
    let server = &body["result"]["serverInfo"];
    println!("   Status: {status}");
    println!(
        "   Server: {} v{}",
        server["name"].as_str().unwrap(),
        server["version"].as_str().unwrap()
    );
    println!("   Session: {session}");

    // 2. Complete the handshake.
    let (status, _, _) = post(
        &router,
        Some(&session),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    println!("\n2. Handshake acknowledged with status {status}");

    // 3. List tools.
    println!("\n3. Listing tools...");
    let (_, _, body) = post(
        &router,
        Some(&session),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    )
    .await;
    for tool in body["result"]["tools"].as_array().unwrap() {
        println!("   - {}", tool["name"].as_str().unwrap());
    }

    // 4. Call the tool.
    println!("\n4. Calling shout...");
    let (_, _, body) = post(
        &router,
        Some(&session),
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "shout", "arguments": {"text": "hello, gateway"}}
        }),
    )
    .await;
    println!(
        "   Result: {}",
        body["result"]["content"][0]["text"].as_str().unwrap()
    );

    // 5. Read the resource.
    println!("\n5. Reading demo://motd...");
    let (_, _, body) = post(
        &router,
        Some(&session),
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "resources/read",
            "params": {"uri": "demo://motd"}
        }),
    )
    .await;
    println!(
        "   Content: {}",
        body["result"]["contents"][0]["text"].as_str().unwrap()
    );

    // 6. Terminate the session.
    println!("\n6. Terminating session...");
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/streamable")
                .header(SESSION_HEADER, &session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    println!("   Status: {}", response.status());

    println!("\n=== Example complete ===");
}
