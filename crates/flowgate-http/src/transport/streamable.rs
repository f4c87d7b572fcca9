//! Streamable transport endpoints: POST, GET, and DELETE on one URL.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{AppendHeaders, IntoResponse, Json, Response};
use futures::stream;
use serde_json::Value;
use tokio::sync::mpsc;

use flowgate::protocol::{batch_has_request, classify_batch, encode_line};
use flowgate::types::error_codes;
use flowgate::{EngineSession, OutboundWriter};

use crate::auth::Principal;
use crate::error::{internal_error_envelope, rpc_error_envelope};
use crate::server::AppState;
use crate::session::{SessionError, SessionRecord};

use super::orchestrator::{render_output, run_turn, ContentPreference, RenderedOutput};
use super::streams::sse_event;

/// Session id header shared by requests and responses.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Resumption hint header. Accepted and logged; replay is not implemented.
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Primary entry point: one engine turn per POST.
pub async fn post_streamable(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_origin(&state, &headers) {
        return resp;
    }
    if let Err(resp) = check_json_content_type(&headers) {
        return resp;
    }
    let session = match resolve_session(&state, &principal, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "malformed request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(rpc_error_envelope(error_codes::PARSE_ERROR, "Parse error")),
            )
                .into_response();
        }
    };

    let batch = classify_batch(&parsed);
    if !batch_has_request(&batch) {
        tracing::debug!(
            session = %session.id,
            "batch without requests acknowledged; engine not invoked"
        );
        return StatusCode::ACCEPTED.into_response();
    }

    let outcome = match run_turn(
        state.catalog.clone(),
        session.initialized,
        batch,
        state.turn,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(session = %session.id, error = %err, "engine turn failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(internal_error_envelope()),
            )
                .into_response();
        }
    };

    let session_header = if outcome.initialize_ack.is_some() {
        state.sessions.mark_initialized(&session.id).await;
        Some(session.id.clone())
    } else {
        None
    };

    let preference = ContentPreference::from_accept(header_str(&headers, header::ACCEPT.as_str()));
    respond(render_output(outcome.responses, preference), session_header)
}

/// Server-initiated stream: long-lived SSE carrying engine-pushed messages.
pub async fn get_streamable(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_origin(&state, &headers) {
        return resp;
    }
    if let Err(resp) = check_stream_accept(&headers) {
        return resp;
    }
    let session = match resolve_session(&state, &principal, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    if let Some(hint) = header_str(&headers, LAST_EVENT_ID_HEADER) {
        tracing::info!(
            session = %session.id,
            last_event_id = hint,
            "resumption hint received; replay is unsupported, starting a fresh stream"
        );
    }

    let (in_tx, in_rx) = mpsc::channel::<String>(8);
    let (writer, out_rx) = OutboundWriter::channel();
    let engine = EngineSession::new(state.catalog.clone()).with_initialized(session.initialized);
    let session_id = session.id.clone();
    tokio::spawn(async move {
        if let Err(err) = engine.run(in_rx, writer).await {
            tracing::error!(session = %session_id, error = %err, "server-initiated stream session failed");
        }
    });

    // The input sender rides inside the stream state: when the client
    // disconnects and the body drops, the engine's input closes and the
    // session ends on its own.
    let stream = stream::unfold((out_rx, in_tx, 0u64), |(mut out_rx, in_tx, seq)| async move {
        let line = out_rx.recv().await?;
        let seq = seq + 1;
        Some((
            Ok::<Event, Infallible>(sse_event(seq, &line)),
            (out_rx, in_tx, seq),
        ))
    });

    (
        AppendHeaders([(SESSION_HEADER, session.id)]),
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Terminate a session. Owner-only; running turns are not cancelled.
pub async fn delete_streamable(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_origin(&state, &headers) {
        return resp;
    }
    let Some(id) = header_str(&headers, SESSION_HEADER) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(rpc_error_envelope(
                error_codes::INVALID_REQUEST,
                "mcp-session-id header is required",
            )),
        )
            .into_response();
    };

    match state.sessions.delete(id, &principal).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(SessionError::Forbidden) => StatusCode::FORBIDDEN.into_response(),
        Err(SessionError::NotFound) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub(crate) async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Principal, Response> {
    let bearer = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "));
    match state.auth.resolve(bearer).await {
        Ok(principal) => Ok(principal),
        Err(err) => {
            tracing::debug!(error = %err, "request rejected: no principal");
            Err(StatusCode::UNAUTHORIZED.into_response())
        }
    }
}

pub(crate) fn check_origin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    state
        .origin
        .check(header_str(headers, header::ORIGIN.as_str()))
        .map_err(|_| StatusCode::FORBIDDEN.into_response())
}

fn check_json_content_type(headers: &HeaderMap) -> Result<(), Response> {
    let Some(content_type) = header_str(headers, header::CONTENT_TYPE.as_str()) else {
        return Ok(());
    };
    if content_type.starts_with("application/json") {
        Ok(())
    } else {
        Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(rpc_error_envelope(
                error_codes::INVALID_REQUEST,
                "Content-Type must be application/json",
            )),
        )
            .into_response())
    }
}

fn check_stream_accept(headers: &HeaderMap) -> Result<(), Response> {
    let Some(accept) = header_str(headers, header::ACCEPT.as_str()) else {
        return Ok(());
    };
    if accept.contains("text/event-stream") || accept.contains("*/*") {
        Ok(())
    } else {
        Err((
            StatusCode::NOT_ACCEPTABLE,
            Json(rpc_error_envelope(
                error_codes::INVALID_REQUEST,
                "Accept must include text/event-stream",
            )),
        )
            .into_response())
    }
}

/// Look up the session named by the request header, or create one when the
/// header is absent. Foreign sessions are never revealed beyond a 403.
async fn resolve_session(
    state: &AppState,
    principal: &Principal,
    headers: &HeaderMap,
) -> Result<SessionRecord, Response> {
    match header_str(headers, SESSION_HEADER) {
        Some(id) => match state.sessions.lookup(id).await {
            Some(record) if record.owner == principal.id => Ok(record),
            Some(_) => {
                tracing::warn!(
                    session = id,
                    principal = %principal.name,
                    "session owned by another principal"
                );
                Err(StatusCode::FORBIDDEN.into_response())
            }
            None => Err((
                StatusCode::NOT_FOUND,
                Json(rpc_error_envelope(
                    error_codes::INVALID_REQUEST,
                    "Unknown session",
                )),
            )
                .into_response()),
        },
        None => Ok(state.sessions.create(principal).await),
    }
}

fn respond(output: RenderedOutput, session_header: Option<String>) -> Response {
    let mut response = match output {
        RenderedOutput::Json(value) => Json(value).into_response(),
        RenderedOutput::JsonArray(values) => Json(values).into_response(),
        RenderedOutput::JsonEmpty => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(internal_error_envelope()),
        )
            .into_response(),
        RenderedOutput::EventStream(messages) => {
            let events: Vec<Result<Event, Infallible>> = messages
                .iter()
                .enumerate()
                .filter_map(|(index, msg)| {
                    encode_line(msg)
                        .ok()
                        .map(|line| Ok(sse_event(index as u64 + 1, &line)))
                })
                .collect();
            Sse::new(stream::iter(events)).into_response()
        }
    };

    // Terminal success only: the header never rides on an error response.
    if let Some(id) = session_header {
        if response.status().is_success() {
            if let Ok(value) = header::HeaderValue::from_str(&id) {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
        }
    }
    response
}
