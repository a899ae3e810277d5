//! Tool trait — the abstraction over step capabilities.
//!
//! Tools are what let a plan act in the world: search a code host, look up
//! the weather, and so on. Each one is a named, fallible `input -> output`
//! function over opaque JSON payloads.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The core Tool trait.
///
/// Tools are registered in the [`ToolRegistry`] and invoked by the step
/// executor. Invocations may be slow and rate-limited; the executor retries
/// them and the cache deduplicates them.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "github_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the planner).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    async fn execute(&self, input: serde_json::Value) -> std::result::Result<serde_json::Value, ToolError>;

    /// Whether repeated calls with identical input may be served from cache.
    ///
    /// Non-idempotent tools must return `false`.
    fn cacheable(&self) -> bool {
        true
    }

    /// Convert this tool into a ToolDefinition for the planner prompt.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The orchestrator uses this to:
/// 1. Get tool definitions to show the planner
/// 2. Look up tools when executing plan steps
///
/// Looking up an unknown name is not an error; it simply yields `None`.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, input: serde_json::Value) -> std::result::Result<serde_json::Value, ToolError> {
            Ok(input)
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[test]
    fn tools_are_cacheable_by_default() {
        assert!(EchoTool.cacheable());
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let tool = registry.get("echo").unwrap();
        let output = tool.execute(serde_json::json!({"text": "hello world"})).await.unwrap();
        assert_eq!(output["text"], "hello world");
    }
}
