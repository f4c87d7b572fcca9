//! Concurrent access: many clients sharing one gateway.
//!
//! Each Streamable POST is its own engine turn, so parallel clients must
//! never observe each other's sessions or responses.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Barrier;
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

fn initialize_body(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "concurrent-test", "version": "0.0.0"}
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

/// Parallel clients each get their own session and their own answers.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_stay_isolated() {
    let router = test_router();
    let barrier = Arc::new(Barrier::new(8));
    let mut handles = vec![];

    for client in 0..8u32 {
        let router = router.clone();
        let barrier = barrier.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await; // Synchronize start

            let (status, session, body) = post_json(&router, None, initialize_body(1)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], 1);
            let session = session.expect("every client gets a session");

            let text = format!("hello from client {client}");
            let (status, _, body) = post_json(&router, Some(&session), echo_body(2, &text)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], 2);
            assert_eq!(
                body["result"]["content"][0]["text"].as_str().unwrap(),
                text,
                "client {client} must get its own echo back"
            );

            session
        }));
    }

    let mut sessions = HashSet::new();
    for handle in handles {
        sessions.insert(handle.await.unwrap());
    }
    assert_eq!(sessions.len(), 8, "session ids must not collide");
}

/// Two turns racing on one session both complete; neither blocks the other.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_turns_on_one_session() {
    let router = test_router();

    let (status, session, _) = post_json(&router, None, initialize_body(1)).await;
    assert_eq!(status, StatusCode::OK);
    let session = session.unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = vec![];
    for turn in 0..2i64 {
        let router = router.clone();
        let session = session.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let text = format!("turn {turn}");
            let (status, _, body) =
                post_json(&router, Some(&session), echo_body(10 + turn, &text)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["result"]["content"][0]["text"].as_str().unwrap(), text);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

/// The handshake is per-session state: a second client cannot ride on the
/// first client's completed initialization.
#[tokio::test]
async fn test_handshake_state_not_shared_across_sessions() {
    let router = test_router();

    let (status, first, _) = post_json(&router, None, initialize_body(1)).await;
    assert_eq!(status, StatusCode::OK);
    let first = first.unwrap();

    // A fresh session that skips initialize is refused in-band.
    let (status, _, body) = post_json(&router, None, echo_body(5, "too early")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32600);

    // The first session is unaffected.
    let (status, _, body) = post_json(&router, Some(&first), echo_body(6, "fine")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["content"][0]["text"], "fine");
}
