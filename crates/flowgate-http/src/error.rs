//! Transport-level errors and the JSON-RPC envelopes they render to.

use serde_json::Value;
use thiserror::Error;

use flowgate::types::{error_codes, EngineError, JsonRpcError, RequestId};

/// Failures raised by the HTTP layer itself.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure while binding or serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine session failed in a way the transport cannot absorb.
    #[error("engine session failed: {0}")]
    Engine(#[from] EngineError),

    /// The server's cancellation token fired mid-connection.
    #[error("server is shutting down")]
    ShuttingDown,
}

/// Build the generic internal-error envelope clients see when a turn fails.
/// Detail stays in the server logs.
pub fn internal_error_envelope() -> Value {
    rpc_error_envelope(error_codes::INTERNAL_ERROR, "Internal error")
}

/// Build a JSON-RPC error envelope with a null id.
pub fn rpc_error_envelope(code: i32, message: &str) -> Value {
    let err = JsonRpcError::new(RequestId::Null, code, message.to_string());
    serde_json::to_value(err).unwrap_or_else(|_| Value::Null)
}
