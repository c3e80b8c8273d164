//! Built-in tool implementations for the planning agent.
//!
//! Tools are capabilities exposed to the LLM during agent runs.
//! Each tool implements the [`Tool`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wayfarer_core::config::Config;

pub mod estimate_budget;
pub mod search_attractions;

/// Context provided to tools during execution.
pub struct ToolContext {
    pub run_id: String,
    pub config: Arc<Config>,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// The core tool trait. Every built-in tool implements this.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the LLM (e.g., "search_attractions").
    fn name(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput>;
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }
}

/// Register every built-in tool.
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(Box::new(search_attractions::SearchAttractionsTool));
    registry.register(Box::new(estimate_budget::EstimateBudgetTool));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry);
        assert_eq!(registry.list(), vec!["search_attractions", "estimate_budget"]);
        assert!(registry.get("estimate_budget").is_some());
        assert!(registry.get("exec").is_none());
    }

    #[test]
    fn test_builtin_schemas_are_objects() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry);
        for tool in registry.tools() {
            let schema = tool.parameters_schema();
            assert_eq!(schema["type"], "object", "{} schema", tool.name());
            assert!(!tool.description().is_empty());
        }
    }
}
