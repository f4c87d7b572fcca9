//! Shared fixtures for the HTTP transport tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use flowgate::types::{ResourceContent, ResourceDefinition, ToolCallResult, ToolDefinition};
use flowgate::{CapabilitySet, StaticCatalog};
use flowgate_http::config::TokenEntry;
use flowgate_http::{build_router, AppState, ServerConfig, TurnConfig};

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Catalog with an echo tool, a deliberately slow tool, and one resource.
pub fn test_catalog() -> Arc<dyn CapabilitySet> {
    let catalog = StaticCatalog::new()
        .tool(
            ToolDefinition {
                name: "echo".to_string(),
                description: Some("Echo text back".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": { "text": {"type": "string"} },
                    "required": ["text"]
                }),
            },
            |arguments| async move {
                let text = arguments
                    .and_then(|args| args.get("text").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_default();
                Ok(ToolCallResult::text(text))
            },
        )
        .tool(
            ToolDefinition {
                name: "slow".to_string(),
                description: Some("Sleeps long enough to trip any short deadline".to_string()),
                input_schema: json!({"type": "object"}),
            },
            |_| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(ToolCallResult::text("done".to_string()))
            },
        )
        .resource(
            ResourceDefinition {
                uri: "gateway://motd".to_string(),
                name: "Message of the day".to_string(),
                description: None,
                mime_type: Some("text/plain".to_string()),
            },
            ResourceContent::text("gateway://motd", "hello from the fixture"),
        );
    Arc::new(catalog)
}

pub fn test_state(config: &ServerConfig) -> AppState {
    AppState::new(config, test_catalog(), CancellationToken::new())
}

/// Router with default configuration.
pub fn test_app() -> Router {
    build_router(test_state(&ServerConfig::default()))
}

/// Router plus the state behind it, for tests that poke at the registry or
/// the shutdown token directly.
pub fn test_app_with_state(config: ServerConfig) -> (Router, AppState) {
    let state = test_state(&config);
    (build_router(state.clone()), state)
}

/// Router with a custom turn deadline, for cancellation tests.
pub fn test_app_with_turn(turn: TurnConfig) -> Router {
    let mut state = test_state(&ServerConfig::default());
    state.turn = turn;
    build_router(state)
}

/// Config with two bearer principals, alice and bob.
pub fn two_principal_config() -> ServerConfig {
    ServerConfig {
        auth_tokens: vec![
            TokenEntry {
                token: "tok-alice".to_string(),
                principal: "alice".to_string(),
            },
            TokenEntry {
                token: "tok-bob".to_string(),
                principal: "bob".to_string(),
            },
        ],
        ..ServerConfig::default()
    }
}

/// Build a Streamable POST carrying one JSON payload.
pub fn streamable_post(session: Option<&str>, accept: &str, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/streamable")
        .header("content-type", "application/json")
        .header("accept", accept);
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Same as [`streamable_post`] but authenticated with a bearer token.
pub fn streamable_post_as(
    token: &str,
    session: Option<&str>,
    accept: &str,
    body: &Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/streamable")
        .header("content-type", "application/json")
        .header("accept", accept)
        .header("authorization", format!("Bearer {token}"));
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A well-formed initialize request.
pub fn initialize_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "0.0.0"}
        }
    })
}

/// Run the handshake and return the session id the server handed out.
pub async fn initialized_session(router: &Router) -> String {
    let response = router
        .clone()
        .oneshot(streamable_post(
            None,
            "application/json",
            &initialize_request(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_header(&response).expect("initialize must set the session header")
}

pub fn session_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SESSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string())
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Split a finite SSE body into (id, event, data) triples, skipping
/// keep-alive comments.
pub fn parse_sse(raw: &str) -> Vec<(Option<String>, String, String)> {
    let mut events = Vec::new();
    for block in raw.split("\n\n").filter(|block| !block.trim().is_empty()) {
        let mut id = None;
        let mut event = String::new();
        let mut data = String::new();
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("id:") {
                id = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data.push_str(rest.trim());
            }
        }
        if event.is_empty() && data.is_empty() {
            continue;
        }
        events.push((id, event, data));
    }
    events
}

/// Pull frames from a live stream until one full SSE event has arrived.
pub async fn next_event(body: &mut Body) -> String {
    use http_body_util::BodyExt;

    let mut buffer = String::new();
    while !buffer.contains("\n\n") {
        let frame = body
            .frame()
            .await
            .expect("stream ended before an event arrived")
            .expect("stream errored");
        if let Ok(data) = frame.into_data() {
            buffer.push_str(std::str::from_utf8(&data).expect("frame is not utf-8"));
        }
    }
    buffer
}
