//! The `ToolExecutor` trait: one seam shared by the downstream MCP client
//! and the skill sandbox, since a workflow `tool` step and a workflow
//! `skill` step both boil down to "run this named capability with these
//! arguments and get JSON back."

use async_trait::async_trait;
use serde_json::Value;

/// Enough of a tool's shape for a prompt step to offer it to a model:
/// name, description, and the JSON Schema its arguments must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A capability a workflow step can invoke by name: a downstream MCP tool,
/// or a sandboxed skill.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute `tool` with `arguments`, returning its JSON result.
    async fn call(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;

    /// Describes the tools this executor currently exposes, for advertising
    /// to a model as callable `tools` in a generation request.
    fn tools(&self) -> Vec<ToolDescriptor>;
}
