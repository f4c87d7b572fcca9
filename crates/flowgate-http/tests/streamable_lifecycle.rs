//! Streamable lifecycle: server-initiated streams, termination, deadlines.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use flowgate_http::{ServerConfig, TurnConfig};

use common::fixtures::{
    body_json, body_text, initialize_request, initialized_session, session_header,
    streamable_post, streamable_post_as, test_app, test_app_with_state, test_app_with_turn,
    two_principal_config, SESSION_HEADER,
};

fn get_request(accept: &str, session: Option<&str>, last_event_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri("/streamable")
        .header("accept", accept);
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    if let Some(hint) = last_event_id {
        builder = builder.header("last-event-id", hint);
    }
    builder.body(Body::empty()).unwrap()
}

fn delete_request(token: Option<&str>, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri("/streamable");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_get_stream_creates_session_and_sets_header() {
    let app = test_app();

    let response = app
        .oneshot(get_request("text/event-stream", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_header(&response).is_some());
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_get_stream_reuses_presented_session() {
    let app = test_app();
    let session = initialized_session(&app).await;

    let response = app
        .oneshot(get_request("text/event-stream", Some(&session), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_header(&response).as_deref(), Some(session.as_str()));
}

#[tokio::test]
async fn test_get_stream_rejects_json_only_accept() {
    let app = test_app();

    let response = app
        .oneshot(get_request("application/json", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_get_stream_accepts_wildcard() {
    let app = test_app();

    let response = app.oneshot(get_request("*/*", None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_resumption_hint_accepted_without_replay() {
    let app = test_app();

    // The hint is logged and the stream starts fresh.
    let response = app
        .oneshot(get_request("text/event-stream", None, Some("42")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_requires_session_header() {
    let app = test_app();

    let response = app.oneshot(delete_request(None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_unknown_session_not_found() {
    let app = test_app();

    let response = app
        .oneshot(delete_request(None, Some("no-such-session")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_then_reuse_not_found() {
    let app = test_app();
    let session = initialized_session(&app).await;

    let response = app
        .clone()
        .oneshot(delete_request(None, Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(streamable_post(
            Some(&session),
            "application/json",
            &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_foreign_session_forbidden() {
    let (app, _state) = test_app_with_state(two_principal_config());

    let response = app
        .clone()
        .oneshot(streamable_post_as(
            "tok-alice",
            None,
            "application/json",
            &initialize_request(),
        ))
        .await
        .unwrap();
    let session = session_header(&response).unwrap();

    let response = app
        .clone()
        .oneshot(delete_request(Some("tok-bob"), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The owner still holds a live session.
    let response = app
        .oneshot(delete_request(Some("tok-alice"), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_turn_deadline_yields_error_envelope_for_json() {
    let app = test_app_with_turn(TurnConfig {
        timeout: Duration::from_millis(200),
        cancel_grace: Duration::from_millis(100),
    });
    let session = initialized_session(&app).await;

    let response = app
        .oneshot(streamable_post(
            Some(&session),
            "application/json",
            &json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "slow", "arguments": {}}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32603);
}

#[tokio::test]
async fn test_turn_deadline_yields_empty_stream_for_sse() {
    let app = test_app_with_turn(TurnConfig {
        timeout: Duration::from_millis(200),
        cancel_grace: Duration::from_millis(100),
    });
    let session = initialized_session(&app).await;

    let response = app
        .oneshot(streamable_post(
            Some(&session),
            "text/event-stream",
            &json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "slow", "arguments": {}}
            }),
        ))
        .await
        .unwrap();

    // A stream caller sees a clean, empty stream rather than an error status.
    assert_eq!(response.status(), StatusCode::OK);
    let raw = body_text(response).await;
    assert!(!raw.contains("event: message"));
}

#[tokio::test]
async fn test_origin_mismatch_passes_by_default() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/streamable")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .header("origin", "http://evil.example:1234")
        .body(Body::from(initialize_request().to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_origin_mismatch_rejected_when_enforced() {
    let (app, _state) = test_app_with_state(ServerConfig {
        enforce_origin: true,
        ..ServerConfig::default()
    });

    let request = Request::builder()
        .method("POST")
        .uri("/streamable")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .header("origin", "http://evil.example:1234")
        .body(Body::from(initialize_request().to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The server's own origin stays welcome.
    let request = Request::builder()
        .method("POST")
        .uri("/streamable")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .header("origin", "http://127.0.0.1:3001")
        .body(Body::from(initialize_request().to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
