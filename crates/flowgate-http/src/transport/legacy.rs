//! Legacy transport: GET opens an SSE stream, a companion POST carries input.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::{stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use flowgate::types::{error_codes, EngineError, EngineResult};
use flowgate::{EngineSession, OutboundWriter};

use crate::error::{rpc_error_envelope, TransportError};
use crate::server::AppState;

use super::streamable::{check_origin, resolve_principal};

/// Inbound capacity per connection. A full queue backpressures the POST side.
const INBOUND_CAPACITY: usize = 32;

/// Live legacy connections, keyed by the id handed out in the endpoint event.
///
/// The map holds weak senders so a dead connection never lingers past its
/// stream: the strong half lives inside the response body and dies with it.
#[derive(Default)]
pub struct LegacyConnections {
    inner: RwLock<HashMap<Uuid, mpsc::WeakSender<String>>>,
}

impl LegacyConnections {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, id: Uuid, tx: mpsc::WeakSender<String>) {
        self.inner.write().await.insert(id, tx);
    }

    async fn remove(&self, id: &Uuid) {
        self.inner.write().await.remove(id);
    }

    /// Upgrade the sender for a connection. A dead entry is pruned on sight.
    async fn sender(&self, id: &Uuid) -> Option<mpsc::Sender<String>> {
        if let Some(tx) = self.inner.read().await.get(id).and_then(|weak| weak.upgrade()) {
            return Some(tx);
        }
        self.inner.write().await.remove(id);
        None
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    session_id: Option<Uuid>,
}

/// Cheap probe used by clients to check the endpoint before streaming.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Open a legacy stream: emit the endpoint event, then engine output as
/// message events until the client goes away.
pub async fn open_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_origin(&state, &headers) {
        return resp;
    }

    let session_id = Uuid::new_v4();
    let (in_tx, in_rx) = mpsc::channel::<String>(INBOUND_CAPACITY);
    let (writer, out_rx) = OutboundWriter::channel();
    state.connections.insert(session_id, in_tx.downgrade()).await;

    let engine = EngineSession::new(state.catalog.clone());
    let engine_task = tokio::spawn(engine.run(in_rx, writer));

    let (event_tx, event_rx) = mpsc::channel::<Event>(INBOUND_CAPACITY);
    let connections = state.connections.clone();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let result = drive_connection(session_id, engine_task, out_rx, event_tx, shutdown).await;
        connections.remove(&session_id).await;
        match result {
            Ok(()) => tracing::info!(session = %session_id, "legacy stream closed"),
            Err(TransportError::ShuttingDown) => {
                tracing::info!(session = %session_id, "legacy stream closed for shutdown")
            }
            Err(err) => tracing::error!(session = %session_id, error = %err, "legacy stream failed"),
        }
    });

    tracing::info!(session = %session_id, principal = %principal.name, "legacy stream opened");

    // The endpoint event tells the client where to POST. The strong input
    // sender rides in the message stream state, so a dropped body closes the
    // engine's input and unwinds the whole connection.
    let endpoint = stream::once(async move {
        Ok::<Event, Infallible>(
            Event::default()
                .event("endpoint")
                .data(format!("/?session_id={}", session_id.simple())),
        )
    });
    let messages = stream::unfold((event_rx, in_tx), |(mut event_rx, in_tx)| async move {
        let event = event_rx.recv().await?;
        Some((Ok::<Event, Infallible>(event), (event_rx, in_tx)))
    });

    Sse::new(endpoint.chain(messages))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Companion input endpoint. Delivery is fire-and-forget: a 202 means the
/// line reached the connection's queue, nothing more.
pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = resolve_principal(&state, &headers).await {
        return resp;
    }
    if let Err(resp) = check_origin(&state, &headers) {
        return resp;
    }

    let Some(session_id) = query.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(rpc_error_envelope(
                error_codes::INVALID_REQUEST,
                "session_id query parameter is required",
            )),
        )
            .into_response();
    };

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(session = %session_id, error = %err, "malformed legacy message body");
            return (
                StatusCode::BAD_REQUEST,
                Json(rpc_error_envelope(error_codes::PARSE_ERROR, "Parse error")),
            )
                .into_response();
        }
    };
    let line = match serde_json::to_string(&parsed) {
        Ok(line) => line,
        Err(err) => {
            tracing::error!(session = %session_id, error = %err, "failed to re-encode message");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(tx) = state.connections.sender(&session_id).await else {
        return unknown_session(session_id);
    };
    if tx.send(line).await.is_err() {
        // The stream went away between lookup and send.
        state.connections.remove(&session_id).await;
        return unknown_session(session_id);
    }

    StatusCode::ACCEPTED.into_response()
}

fn unknown_session(session_id: Uuid) -> Response {
    tracing::debug!(session = %session_id, "message for unknown legacy session");
    (
        StatusCode::NOT_FOUND,
        Json(rpc_error_envelope(
            error_codes::INVALID_REQUEST,
            "Unknown session_id",
        )),
    )
        .into_response()
}

/// Pump engine output into the client's event queue until one side ends.
async fn drive_connection(
    session_id: Uuid,
    engine_task: JoinHandle<EngineResult<()>>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                engine_task.abort();
                return Err(TransportError::ShuttingDown);
            }
            line = out_rx.recv() => match line {
                Some(line) => {
                    let event = Event::default().event("message").data(line);
                    if event_tx.send(event).await.is_err() {
                        tracing::info!(session = %session_id, "legacy client disconnected");
                        engine_task.abort();
                        return Ok(());
                    }
                }
                None => {
                    // Writer dropped: the engine loop has returned.
                    return match engine_task.await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(TransportError::Engine(err)),
                        Err(err) => Err(TransportError::Engine(EngineError::Internal(
                            err.to_string(),
                        ))),
                    };
                }
            }
        }
    }
}
