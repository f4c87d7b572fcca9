//! Stress: large batches, rapid turn sequences, session churn.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use flowgate::types::{ToolCallResult, ToolDefinition};
use flowgate::StaticCatalog;
use flowgate_http::{build_router, AppState, ServerConfig};

// ─── Helpers ───────────────────────────────────────────────────────────────

const SESSION_HEADER: &str = "mcp-session-id";

fn test_router() -> Router {
    let catalog = StaticCatalog::new().tool(
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
    );
    let state = AppState::new(
        &ServerConfig::default(),
        Arc::new(catalog),
        CancellationToken::new(),
    );
    build_router(state)
}

async fn post_json(
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

async fn delete_session(router: &Router, session: &str) -> StatusCode {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/streamable")
                .header(SESSION_HEADER, session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "stress-test", "version": "0.0.0"}
        }
    })
}

fn echo_body(id: i64, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": "echo", "arguments": {"text": text}}
    })
}

// ─── Tests ─────────────────────────────────────────────────────────────────

/// One POST carrying a wide batch comes back as one array in exact order.
#[tokio::test]
async fn test_wide_batch_preserves_order() {
    let router = test_router();

    let mut batch = vec![
        initialize_body(),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    ];
    for i in 1..=60i64 {
        batch.push(echo_body(i, &format!("payload {i}")));
    }

    let (status, session, body) = post_json(&router, None, Value::Array(batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(session.is_some(), "initialize ack sets the header");

    let responses = body.as_array().expect("batch renders as an array");
    assert_eq!(responses.len(), 61);
    assert_eq!(responses[0]["id"], 0);
    assert!(responses[0]["result"]["serverInfo"].is_object());
    for i in 1..=60usize {
        assert_eq!(responses[i]["id"], i as i64, "response {i} out of order");
        assert_eq!(
            responses[i]["result"]["content"][0]["text"]
                .as_str()
                .unwrap(),
            format!("payload {i}")
        );
    }
}

/// Many sequential turns against one session stay coherent.
#[tokio::test]
async fn test_rapid_sequential_turns() {
    let router = test_router();

    let (status, session, _) = post_json(&router, None, initialize_body()).await;
    assert_eq!(status, StatusCode::OK);
    let session = session.unwrap();

    for i in 1..=50i64 {
        let text = format!("turn {i}");
        let (status, header, body) = post_json(&router, Some(&session), echo_body(i, &text)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(header.is_none(), "only the initialize ack carries the header");
        assert_eq!(body["id"], i);
        assert_eq!(body["result"]["content"][0]["text"].as_str().unwrap(), text);
    }
}

/// Sessions created and destroyed in a tight loop never leak into each other.
#[tokio::test]
async fn test_session_churn() {
    let router = test_router();
    let mut seen = HashSet::new();

    for _ in 0..25 {
        let (status, session, _) = post_json(&router, None, initialize_body()).await;
        assert_eq!(status, StatusCode::OK);
        let session = session.unwrap();
        assert!(seen.insert(session.clone()), "session id reused");

        assert_eq!(delete_session(&router, &session).await, StatusCode::NO_CONTENT);

        // The id is dead immediately after deletion.
        let (status, _, _) = post_json(&router, Some(&session), echo_body(1, "late")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
