//! One engine session: a dispatch loop over newline-delimited messages.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::protocol::{classify_line, encode_line, Handshake};
use crate::types::{
    EngineError, EngineResult, InitializeParams, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, PromptListResult, RequestId, ResourceListResult,
    ResourceReadParams, ToolCallParams, ToolListResult,
};

use super::CapabilitySet;

/// Engine-facing write half of a session.
///
/// Writes are best-effort: once the transport stops listening, lines are
/// dropped without error. A late write means the engine outlived its
/// orchestration window, which is not worth failing a session over.
#[derive(Clone)]
pub struct OutboundWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl OutboundWriter {
    /// Create a writer plus the transport-side receiver it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append one outbound line.
    pub fn write(&self, line: String) {
        if self.tx.send(line).is_err() {
            tracing::debug!("outbound write after transport close, dropped");
        }
    }

    /// Serialize and append one outbound message.
    pub fn write_message(&self, msg: &JsonRpcMessage) -> EngineResult<()> {
        self.write(encode_line(msg)?);
        Ok(())
    }
}

/// Drives one session of the protocol engine over a pair of line channels.
///
/// The Streamable transport runs one short-lived session per POST turn; the
/// legacy transport runs one for the whole connection. Both feed the same
/// loop.
pub struct EngineSession {
    catalog: Arc<dyn CapabilitySet>,
    handshake: Handshake,
}

impl EngineSession {
    /// Create a fresh session against the given capability set.
    pub fn new(catalog: Arc<dyn CapabilitySet>) -> Self {
        Self {
            catalog,
            handshake: Handshake::default(),
        }
    }

    /// Seed the handshake state, skipping initialization for sessions that
    /// already completed it in an earlier turn.
    pub fn with_initialized(mut self, initialized: bool) -> Self {
        if initialized {
            self.handshake.mark_initialized();
        }
        self
    }

    /// Consume inbound lines until the channel closes, writing replies as
    /// they are produced.
    ///
    /// Returns `Err` only for failures the transport must inspect: a
    /// [`EngineError::Validation`] when handshake parameters fail schema
    /// checks, or an internal fault. Per-request problems become error
    /// responses on the outbound stream instead.
    pub async fn run(
        mut self,
        mut incoming: mpsc::Receiver<String>,
        outgoing: OutboundWriter,
    ) -> EngineResult<()> {
        while let Some(line) = incoming.recv().await {
            let Some(msg) = classify_line(&line) else {
                tracing::debug!("dropping inbound line that does not classify");
                continue;
            };
            tracing::debug!(kind = msg.kind(), "engine received message");

            match msg {
                JsonRpcMessage::Request(req) => {
                    let reply = self.handle_request(req).await?;
                    outgoing.write_message(&reply)?;
                }
                JsonRpcMessage::Notification(notif) => self.handle_notification(notif),
                JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                    tracing::debug!("ignoring client reply on the inbound stream");
                }
            }
        }
        Ok(())
    }

    async fn handle_request(&mut self, req: JsonRpcRequest) -> EngineResult<JsonRpcMessage> {
        match req.method.as_str() {
            "initialize" => {
                let params: InitializeParams =
                    serde_json::from_value(req.params.unwrap_or_else(|| json!({})))
                        .map_err(|e| EngineError::Validation(e.to_string()))?;
                let result = self.handshake.negotiate(params);
                Ok(JsonRpcMessage::Response(JsonRpcResponse::new(
                    req.id,
                    to_value(result)?,
                )))
            }
            "ping" => Ok(JsonRpcMessage::Response(JsonRpcResponse::new(
                req.id,
                json!({}),
            ))),
            method => {
                if let Err(err) = self.handshake.ensure_initialized() {
                    return Ok(error_reply(req.id, &err));
                }
                match self.dispatch(method, req.params).await {
                    Ok(result) => Ok(JsonRpcMessage::Response(JsonRpcResponse::new(
                        req.id, result,
                    ))),
                    Err(err) => Ok(error_reply(req.id, &err)),
                }
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> EngineResult<Value> {
        match method {
            "tools/list" => {
                let tools = self.catalog.list_tools().await?;
                to_value(ToolListResult {
                    tools,
                    next_cursor: None,
                })
            }
            "tools/call" => {
                let call: ToolCallParams = parse_params(params)?;
                let result = self.catalog.call_tool(&call.name, call.arguments).await?;
                to_value(result)
            }
            "resources/list" => {
                let resources = self.catalog.list_resources().await?;
                to_value(ResourceListResult {
                    resources,
                    next_cursor: None,
                })
            }
            "resources/read" => {
                let read: ResourceReadParams = parse_params(params)?;
                let result = self.catalog.read_resource(&read.uri).await?;
                to_value(result)
            }
            "prompts/list" => {
                let prompts = self.catalog.list_prompts().await?;
                to_value(PromptListResult {
                    prompts,
                    next_cursor: None,
                })
            }
            other => Err(EngineError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_notification(&mut self, notif: JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" | "initialized" => {
                self.handshake.mark_initialized();
                tracing::info!("handshake complete");
            }
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> EngineResult<T> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|e| EngineError::InvalidParams(e.to_string()))
}

fn to_value<T: Serialize>(value: T) -> EngineResult<Value> {
    serde_json::to_value(value).map_err(|e| EngineError::Internal(e.to_string()))
}

fn error_reply(id: RequestId, err: &EngineError) -> JsonRpcMessage {
    JsonRpcMessage::Error(err.to_json_rpc_error(id))
}
