//! Tool registry and [`Tool`] trait definition.
//!
//! Defines the interface every tool implements ([`Tool`]) and a
//! [`ToolRegistry`] that stores tools and dispatches calls by name.
//!
//! [`ToolRegistry::invoke`] is the tool boundary: whatever happens inside
//! a tool (typed error or panic) comes out as a JSON payload, either the
//! tool's success value or `{"error": {"kind", "message"}}`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use clawgate_types::ToolError;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

/// A callable tool exposed to the agent.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use clawgate_tools::registry::Tool;
/// use clawgate_types::ToolError;
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Echo the input" }
///     fn parameters(&self) -> serde_json::Value {
///         serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
///     }
///     async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
///         Ok(args)
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Name-indexed collection of tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!(tool = %name, "registering tool");
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names (sorted alphabetically).
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Tool schemas in function-calling format, sorted by name:
    ///
    /// ```json
    /// { "type": "function",
    ///   "function": { "name": "...", "description": "...", "parameters": { ... } } }
    /// ```
    pub fn schemas(&self) -> Vec<Value> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(&name).map(|tool| schema_of(tool.as_ref())))
            .collect()
    }

    /// Execute a tool by name, returning its typed result.
    ///
    /// Returns [`ToolError::UnknownTool`] if no tool with that name is
    /// registered. Panics inside the tool are caught and reported as
    /// [`ToolError::Failed`].
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        debug!(tool = %name, "executing tool");
        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ToolError::Failed(format!("tool {name} panicked: {detail}")))
            }
        }
    }

    /// Execute a tool by name and serialize the outcome.
    ///
    /// Never fails: errors become `{"error": {"kind", "message"}}`.
    pub async fn invoke(&self, name: &str, args: Value) -> Value {
        match self.execute(name, args).await {
            Ok(value) => value,
            Err(err) => {
                warn!(tool = %name, kind = %err.kind(), error = %err, "tool call failed");
                err.to_failure().into_payload()
            }
        }
    }

    /// Return the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Return true if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Function-calling schema for a single tool.
pub fn schema_of(tool: &dyn Tool) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters(),
        }
    })
}

/// `true` when `payload` is an error envelope produced by [`ToolRegistry::invoke`].
pub fn is_error_payload(payload: &Value) -> bool {
    payload
        .get("error")
        .and_then(|e| e.get("kind"))
        .is_some_and(Value::is_string)
}
