//! Engine error taxonomy and JSON-RPC error code mapping.

use thiserror::Error;

use super::message::{JsonRpcError, RequestId};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Gateway-specific error codes in the implementation-defined range.
pub mod gateway_error_codes {
    /// Named tool is not in the capability set.
    pub const TOOL_NOT_FOUND: i32 = -32001;
    /// Named resource is not in the capability set.
    pub const RESOURCE_NOT_FOUND: i32 = -32002;
    /// Named prompt is not in the capability set.
    pub const PROMPT_NOT_FOUND: i32 = -32003;
}

/// Everything that can go wrong inside an engine session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Payload was not valid JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Message violated protocol rules (e.g. request before handshake).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown method name.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Parameters did not match the method's expected shape.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Schema validation failed while driving the handshake. Transports treat
    /// this as "no usable response", never as a server fault.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Requested tool does not exist.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Requested resource does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Requested prompt does not exist.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Anything else; surfaced to clients as a generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::Parse(_) => error_codes::PARSE_ERROR,
            EngineError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            EngineError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            EngineError::InvalidParams(_) | EngineError::Validation(_) => {
                error_codes::INVALID_PARAMS
            }
            EngineError::ToolNotFound(_) => gateway_error_codes::TOOL_NOT_FOUND,
            EngineError::ResourceNotFound(_) => gateway_error_codes::RESOURCE_NOT_FOUND,
            EngineError::PromptNotFound(_) => gateway_error_codes::PROMPT_NOT_FOUND,
            EngineError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Convert into a JSON-RPC error envelope for the given request id.
    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError::new(id, self.code(), self.to_string())
    }
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
