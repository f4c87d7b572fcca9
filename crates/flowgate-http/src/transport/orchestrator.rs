//! One engine turn per POST: deadline, cancellation, response shaping.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use flowgate::protocol::encode_line;
use flowgate::types::{EngineError, JsonRpcMessage, RequestId};
use flowgate::{CapabilitySet, EngineSession};

use crate::error::TransportError;

use super::streams::{ReadStream, WriteStream};

/// Deadline and cancellation grace for one turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnConfig {
    /// Hard ceiling on engine execution.
    pub timeout: Duration,
    /// How long a cancelled turn may take to acknowledge.
    pub cancel_grace: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cancel_grace: Duration::from_millis(1000),
        }
    }
}

/// Lifecycle of one orchestrated turn.
#[derive(Debug, Clone, Copy)]
enum TurnPhase {
    Idle,
    AwaitingEngine,
    Draining,
    Formatting,
    Done,
}

fn debug_phase(phase: TurnPhase) {
    tracing::debug!(?phase, "turn phase");
}

/// What a completed turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Messages the engine wrote, in production order.
    pub responses: Vec<JsonRpcMessage>,
    /// Whether the deadline cancelled the turn.
    pub timed_out: bool,
    /// Id of the successful initialize result, when the batch asked for one.
    pub initialize_ack: Option<RequestId>,
}

/// Run one engine turn over a classified batch.
///
/// The engine executes on its own task so it can be raced against the
/// deadline and cancelled independently of the request task. On every exit
/// path, success, timeout, or error, the read stream is closed and no
/// engine task survives. A turn that fails schema validation yields
/// whatever responses were buffered; any other engine failure is fatal.
pub async fn run_turn(
    catalog: Arc<dyn CapabilitySet>,
    initialized: bool,
    batch: Vec<JsonRpcMessage>,
    config: TurnConfig,
) -> Result<TurnOutcome, TransportError> {
    debug_phase(TurnPhase::Idle);
    let mut lines = Vec::with_capacity(batch.len());
    for msg in &batch {
        lines.push(encode_line(msg).map_err(TransportError::Engine)?);
    }

    let (mut read_stream, incoming) = ReadStream::new(lines);
    let (writer, mut write_stream) = WriteStream::pair();
    let session = EngineSession::new(catalog).with_initialized(initialized);
    let mut engine = tokio::spawn(session.run(incoming, writer));

    debug_phase(TurnPhase::AwaitingEngine);
    read_stream.feed().await;
    read_stream.close();

    let waited = timeout(config.timeout, &mut engine).await;

    debug_phase(TurnPhase::Draining);
    // Cleanup is unconditional: no exit path leaves the read stream open or
    // a turn running behind the HTTP call.
    read_stream.close();

    let timed_out = waited.is_err();
    let engine_error = match waited {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(err))) => Some(err),
        Ok(Err(join_err)) => Some(EngineError::Internal(join_err.to_string())),
        Err(_) => {
            engine.abort();
            if timeout(config.cancel_grace, &mut engine).await.is_err() {
                tracing::warn!("cancelled turn did not acknowledge within the grace period");
            }
            tracing::warn!(
                timeout_ms = config.timeout.as_millis() as u64,
                "engine turn exceeded its deadline and was cancelled"
            );
            None
        }
    };

    if let Some(err) = engine_error {
        if matches!(err, EngineError::Validation(_)) {
            tracing::debug!(error = %err, "engine rejected the payload during validation; no usable response");
        } else {
            return Err(TransportError::Engine(err));
        }
    }

    let responses = write_stream.drain();

    debug_phase(TurnPhase::Formatting);
    let initialize_ack = initialize_ack(&batch, &responses);

    debug_phase(TurnPhase::Done);
    Ok(TurnOutcome {
        responses,
        timed_out,
        initialize_ack,
    })
}

/// Find the id of a success result answering an initialize request from
/// this batch.
fn initialize_ack(batch: &[JsonRpcMessage], responses: &[JsonRpcMessage]) -> Option<RequestId> {
    let wanted: Vec<&RequestId> = batch
        .iter()
        .filter_map(|msg| match msg {
            JsonRpcMessage::Request(req) if req.method == "initialize" => Some(&req.id),
            _ => None,
        })
        .collect();
    if wanted.is_empty() {
        return None;
    }
    responses.iter().find_map(|msg| match msg {
        JsonRpcMessage::Response(resp) if wanted.contains(&&resp.id) => Some(resp.id.clone()),
        _ => None,
    })
}

/// Response encodings a client can prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPreference {
    /// Plain JSON bodies.
    Json,
    /// SSE framing; the default, and the winner whenever both are
    /// acceptable.
    EventStream,
}

impl ContentPreference {
    /// Derive the preference from an Accept header.
    pub fn from_accept(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return ContentPreference::EventStream;
        };
        let wants_json = accept.contains("application/json");
        let wants_stream = accept.contains("text/event-stream");
        if wants_json && !wants_stream {
            ContentPreference::Json
        } else {
            ContentPreference::EventStream
        }
    }
}

/// One rendered response shape, chosen from buffered output and preference.
#[derive(Debug)]
pub enum RenderedOutput {
    /// Exactly one message, JSON mode.
    Json(Value),
    /// Several messages, JSON mode, in production order.
    JsonArray(Vec<Value>),
    /// Messages framed as an event stream (default mode).
    EventStream(Vec<JsonRpcMessage>),
    /// JSON mode with nothing buffered. Rendered as an internal-error
    /// envelope with an error status so a JSON caller never gets an empty
    /// body.
    JsonEmpty,
}

/// Select the response shape. Pure; HTTP framing happens in the handlers.
pub fn render_output(
    responses: Vec<JsonRpcMessage>,
    preference: ContentPreference,
) -> RenderedOutput {
    match preference {
        ContentPreference::EventStream => RenderedOutput::EventStream(responses),
        ContentPreference::Json => {
            let mut values: Vec<Value> = responses
                .iter()
                .filter_map(|msg| serde_json::to_value(msg).ok())
                .collect();
            match values.len() {
                0 => RenderedOutput::JsonEmpty,
                1 => RenderedOutput::Json(values.remove(0)),
                _ => RenderedOutput::JsonArray(values),
            }
        }
    }
}
