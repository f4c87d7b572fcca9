//! Initialization handshake state for one engine session.

use crate::types::{
    EngineError, EngineResult, Implementation, InitializeParams, InitializeResult,
    PROTOCOL_VERSION,
};

/// Handshake progress and the client identity it established.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// Client implementation info, once announced.
    pub client: Option<Implementation>,
    /// Whether the handshake is complete.
    pub initialized: bool,
}

impl Handshake {
    /// Process an initialize request and return the result.
    pub fn negotiate(&mut self, params: InitializeParams) -> InitializeResult {
        if let Some(requested) = &params.protocol_version {
            if requested != PROTOCOL_VERSION {
                tracing::warn!(
                    "Client requested protocol version {requested}, server supports \
                     {PROTOCOL_VERSION}. Proceeding with the server version."
                );
            }
        }

        if let Some(client) = &params.client_info {
            tracing::info!("Initialized with client: {} v{}", client.name, client.version);
        }
        self.client = params.client_info;

        InitializeResult::default_result()
    }

    /// Mark the handshake as complete (after the `initialized` notification
    /// or a resumed session).
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Check that the handshake is complete before processing requests.
    pub fn ensure_initialized(&self) -> EngineResult<()> {
        if !self.initialized {
            return Err(EngineError::InvalidRequest(
                "session not initialized; send 'initialize' first".to_string(),
            ));
        }
        Ok(())
    }
}
