//! Wraps one loaded [`Workflow`] as an [`McpTool`], so the process exposing
//! the workflow registry over MCP can list/call workflows exactly like any
//! other tool (spec.md's "every workflow is a tool" contract).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use conduit_interface::McpTool;

use crate::executor::WorkflowRuntime;

/// One workflow, addressable through `tools/list`/`tools/call` under its
/// own name.
pub struct WorkflowTool {
    name: String,
    description: String,
    input_schema: Value,
    runtime: WorkflowRuntime,
}

impl WorkflowTool {
    pub fn new(name: String, description: String, input_schema: Value, runtime: WorkflowRuntime) -> Self {
        Self { name, description, input_schema, runtime }
    }
}

#[async_trait]
impl McpTool for WorkflowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(
        &self,
        input: Value,
        cancellation: CancellationToken,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self.runtime
            .run(&self.name, input, cancellation)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// Builds one [`WorkflowTool`] per workflow `runtime` has loaded, ready to
/// hand to a `conduit_interface::ToolRegistry`.
pub fn build_workflow_tools(runtime: &WorkflowRuntime) -> Vec<Arc<dyn McpTool>> {
    runtime
        .workflows()
        .names()
        .filter_map(|name| runtime.workflows().get(name))
        .map(|workflow| {
            Arc::new(WorkflowTool::new(
                workflow.name.clone(),
                workflow.description.clone(),
                workflow.input_schema.clone().unwrap_or_else(|| serde_json::json!({})),
                runtime.clone(),
            )) as Arc<dyn McpTool>
        })
        .collect()
}
