//! The `McpTool` trait and its registry: the seam between whatever exposes
//! callable capabilities (chiefly the workflow registry — one tool per
//! loaded workflow) and the MCP protocol state machine that lists and
//! invokes them over the wire. Kept here, rather than in the protocol
//! crate itself, so a capability-providing crate can implement it without
//! depending back on the protocol crate.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A capability exposed to MCP clients via `tools/list`/`tools/call`.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name as advertised to clients; also the `tools/call` dispatch key.
    fn name(&self) -> &str;

    /// Human-readable description shown to the calling model.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's expected arguments.
    fn input_schema(&self) -> Value;

    /// Run the tool body and return its JSON result. `cancellation` is the
    /// caller's cancellation token — for a task-augmented call this is the
    /// task's own token, so `tasks/cancel` reaches all the way into the
    /// running tool body instead of only flipping a flag nothing observes.
    async fn execute(
        &self,
        input: Value,
        cancellation: CancellationToken,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;
}

/// Registry of tools exposed over MCP. Cheaply cloneable; built once at
/// startup and shared across sessions.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<Vec<Arc<dyn McpTool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Arc::new(Vec::new()) }
    }

    pub fn from_tools(tools: Vec<Arc<dyn McpTool>>) -> Self {
        Self { tools: Arc::new(tools) }
    }

    /// Registers a tool. Cheap in practice: registration only happens once,
    /// at startup, before the registry is shared across sessions.
    pub fn register(&mut self, tool: Arc<dyn McpTool>) {
        Arc::make_mut(&mut self.tools).push(tool);
    }

    pub fn list(&self) -> &[Arc<dyn McpTool>] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }
}
