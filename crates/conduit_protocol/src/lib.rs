//! The MCP protocol state machine: handshake, capability negotiation, the
//! tool surface, and SEP-1686 task operations, wired onto
//! `conduit_transport`'s single-reader dispatcher.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use conduit_interface::ToolRegistry;
//! use conduit_protocol::{McpServerHandler, ServerInfo};
//! use conduit_tasks::TaskManager;
//! use conduit_transport::{Dispatcher, Session};
//!
//! # async fn run(tools: ToolRegistry) {
//! let tasks = TaskManager::new();
//! tasks.spawn_sweeper();
//! let handler = Arc::new(McpServerHandler::new(
//!     ServerInfo { name: "conduit".into(), version: env!("CARGO_PKG_VERSION").into() },
//!     tools,
//!     tasks,
//! ));
//! let session = Session::from_stdio();
//! let (_dispatcher, join) = Dispatcher::spawn(session, handler);
//! let _ = join.await;
//! # }
//! ```

#![forbid(unsafe_code)]

mod capabilities;
mod error_mapping;
mod handler;
mod schema;
mod session_state;

pub use capabilities::{negotiate_version, server_capabilities, PROTOCOL_VERSION};
pub use handler::{McpServerHandler, ServerInfo};
pub use session_state::SessionState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use conduit_interface::{McpTool, ToolRegistry};
    use conduit_tasks::TaskManager;
    use conduit_transport::IncomingHandler;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl McpTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> Value {
            json!({ "type": "object", "required": ["text"], "properties": { "text": { "type": "string" } } })
        }
        async fn execute(
            &self,
            input: Value,
            _cancellation: CancellationToken,
        ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
            Ok(input)
        }
    }

    /// A tool whose body blocks until either its caller-supplied
    /// cancellation token fires or an unreasonably long timeout elapses,
    /// standing in for a slow downstream call a real tool step might make.
    struct SlowTool;

    #[async_trait]
    impl McpTool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "blocks until cancelled"
        }
        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(
            &self,
            _input: Value,
            cancellation: CancellationToken,
        ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
            tokio::select! {
                _ = cancellation.cancelled() => Err("cancelled".into()),
                _ = tokio::time::sleep(std::time::Duration::from_secs(30)) => Ok(json!("too slow")),
            }
        }
    }

    fn handler() -> McpServerHandler {
        let tools = ToolRegistry::from_tools(vec![
            Arc::new(EchoTool) as Arc<dyn McpTool>,
            Arc::new(SlowTool) as Arc<dyn McpTool>,
        ]);
        McpServerHandler::new(
            ServerInfo { name: "conduit".into(), version: "0.1.0".into() },
            tools,
            TaskManager::new(),
        )
    }

    #[tokio::test]
    async fn rejects_everything_before_initialize() {
        let h = handler();
        let result = h
            .handle_request("tools/list", Value::Null, CancellationToken::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn full_handshake_then_tool_call() {
        let h = handler();
        let init = h
            .handle_request("initialize", json!({ "protocolVersion": PROTOCOL_VERSION }), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(init["protocolVersion"], PROTOCOL_VERSION);

        h.handle_notification("initialized", Value::Null).await;

        let list = h
            .handle_request("tools/list", Value::Null, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(list["tools"].as_array().unwrap().len(), 2);

        let result = h
            .handle_request(
                "tools/call",
                json!({ "name": "echo", "arguments": { "text": "hi" } }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result["structuredContent"]["text"], "hi");
    }

    #[tokio::test]
    async fn tool_call_rejects_bad_schema() {
        let h = handler();
        h.handle_request("initialize", json!({}), CancellationToken::new()).await.unwrap();
        h.handle_notification("initialized", Value::Null).await;

        let result = h
            .handle_request(
                "tools/call",
                json!({ "name": "echo", "arguments": {} }),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn task_augmented_call_completes_in_background() {
        let h = handler();
        h.handle_request("initialize", json!({}), CancellationToken::new()).await.unwrap();
        h.handle_notification("initialized", Value::Null).await;

        let reply = h
            .handle_request(
                "tools/call",
                json!({ "name": "echo", "arguments": { "text": "hi" }, "task": { "ttl": 60 } }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let task_id = reply["metadata"]["task_id"].as_str().unwrap().to_string();
        assert_eq!(reply["metadata"]["status"], "working");

        let snapshot = h
            .handle_request(
                "tasks/result",
                json!({ "taskId": task_id, "timeoutSecs": 5 }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(snapshot["status"], "completed");
    }

    #[tokio::test]
    async fn tasks_cancel_reaches_the_running_tool_body() {
        let h = handler();
        h.handle_request("initialize", json!({}), CancellationToken::new()).await.unwrap();
        h.handle_notification("initialized", Value::Null).await;

        let reply = h
            .handle_request(
                "tools/call",
                json!({ "name": "slow", "arguments": {}, "task": { "ttl": 60 } }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let task_id = reply["metadata"]["task_id"].as_str().unwrap().to_string();

        h.handle_request("tasks/cancel", json!({ "taskId": task_id }), CancellationToken::new())
            .await
            .unwrap();

        let snapshot = h
            .handle_request(
                "tasks/result",
                json!({ "taskId": task_id, "timeoutSecs": 5 }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(snapshot["status"], "cancelled");
    }
}
