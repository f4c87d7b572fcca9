//! A fixed, builder-style capability set for embedding and tests.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::types::{
    EngineError, EngineResult, PromptDefinition, ReadResourceResult, ResourceContent,
    ResourceDefinition, ToolCallResult, ToolDefinition,
};

use super::CapabilitySet;

type ToolHandler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, EngineResult<ToolCallResult>> + Send + Sync>;

/// Capability set backed by statically registered tools, resources, and
/// prompts. Registration order is listing order.
#[derive(Default, Clone)]
pub struct StaticCatalog {
    tools: Vec<(ToolDefinition, ToolHandler)>,
    resources: Vec<(ResourceDefinition, ReadResourceResult)>,
    prompts: Vec<PromptDefinition>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with its async handler.
    pub fn tool<F, Fut>(mut self, definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<ToolCallResult>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args| Box::pin(handler(args)));
        self.tools.push((definition, handler));
        self
    }

    /// Register a resource with fixed content.
    pub fn resource(mut self, definition: ResourceDefinition, content: ResourceContent) -> Self {
        self.resources.push((
            definition,
            ReadResourceResult {
                contents: vec![content],
            },
        ));
        self
    }

    /// Register a prompt definition.
    pub fn prompt(mut self, definition: PromptDefinition) -> Self {
        self.prompts.push(definition);
        self
    }
}

#[async_trait]
impl CapabilitySet for StaticCatalog {
    async fn list_tools(&self) -> EngineResult<Vec<ToolDefinition>> {
        Ok(self.tools.iter().map(|(def, _)| def.clone()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> EngineResult<ToolCallResult> {
        let handler = self
            .tools
            .iter()
            .find(|(def, _)| def.name == name)
            .map(|(_, handler)| handler.clone())
            .ok_or_else(|| EngineError::ToolNotFound(name.to_string()))?;
        handler(arguments).await
    }

    async fn list_resources(&self) -> EngineResult<Vec<ResourceDefinition>> {
        Ok(self.resources.iter().map(|(def, _)| def.clone()).collect())
    }

    async fn read_resource(&self, uri: &str) -> EngineResult<ReadResourceResult> {
        self.resources
            .iter()
            .find(|(def, _)| def.uri == uri)
            .map(|(_, result)| result.clone())
            .ok_or_else(|| EngineError::ResourceNotFound(uri.to_string()))
    }

    async fn list_prompts(&self) -> EngineResult<Vec<PromptDefinition>> {
        Ok(self.prompts.clone())
    }
}
