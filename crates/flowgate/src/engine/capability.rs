//! The capability seam between transports and whatever executes tools.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{
    EngineResult, PromptDefinition, ReadResourceResult, ResourceDefinition, ToolCallResult,
    ToolDefinition,
};

/// Tool, resource, and prompt operations exposed by a protocol engine.
///
/// Both transports receive the same `Arc<dyn CapabilitySet>`; the gateway
/// never wires an engine twice. Implementations map their own failures to
/// [`EngineError`](crate::types::EngineError) variants so error codes reach
/// clients unchanged.
#[async_trait]
pub trait CapabilitySet: Send + Sync {
    /// List every available tool.
    async fn list_tools(&self) -> EngineResult<Vec<ToolDefinition>>;

    /// Invoke one tool by name.
    async fn call_tool(&self, name: &str, arguments: Option<Value>)
        -> EngineResult<ToolCallResult>;

    /// List every available resource.
    async fn list_resources(&self) -> EngineResult<Vec<ResourceDefinition>>;

    /// Read one resource by URI.
    async fn read_resource(&self, uri: &str) -> EngineResult<ReadResourceResult>;

    /// List every available prompt.
    async fn list_prompts(&self) -> EngineResult<Vec<PromptDefinition>>;
}
