//! Flowgate protocol engine: the JSON-RPC message model, classification,
//! and capability dispatch shared by every Flowgate transport.
//!
//! This crate is transport-agnostic: it consumes and produces
//! newline-delimited JSON-RPC messages over channels, and reaches tools,
//! resources, and prompts through the injected [`CapabilitySet`] trait.

pub mod engine;
pub mod protocol;
pub mod types;

pub use engine::{CapabilitySet, EngineSession, OutboundWriter, StaticCatalog};
pub use protocol::{classify, classify_batch, classify_line, encode_line, Handshake};
pub use types::{
    EngineError, EngineResult, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};
