//! The MCP server state machine: the [`conduit_transport::IncomingHandler`]
//! implementation that drives `initialize`/`initialized`, `tools/list`,
//! `tools/call` (sync and task-augmented), and the `tasks/*` family.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use conduit_interface::ToolRegistry;
use conduit_tasks::{TaskManager, TaskStatus, DEFAULT_RESULT_TIMEOUT_SECS};
use conduit_transport::{error_codes, IncomingHandler, JsonRpcError};

use crate::capabilities::{negotiate_version, server_capabilities, PROTOCOL_VERSION};
use crate::error_mapping::{
    internal_error, invalid_params, invalid_state, missing_param, not_found, task_envelope,
    tool_error, tool_result_envelope, unknown_method,
};
use crate::schema;
use crate::session_state::SessionState;

/// Identifies this server in the `initialize` response.
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Drives one MCP session's protocol state machine. One instance per
/// connected transport; the tool registry and task manager underneath are
/// shared across every session.
pub struct McpServerHandler {
    info: ServerInfo,
    state: Mutex<SessionState>,
    tools: ToolRegistry,
    tasks: TaskManager,
    default_result_timeout: Duration,
}

impl McpServerHandler {
    pub fn new(info: ServerInfo, tools: ToolRegistry, tasks: TaskManager) -> Self {
        Self {
            info,
            state: Mutex::new(SessionState::New),
            tools,
            tasks,
            default_result_timeout: Duration::from_secs(DEFAULT_RESULT_TIMEOUT_SECS),
        }
    }

    fn state(&self) -> SessionState {
        *self.state.lock().expect("session state mutex poisoned")
    }

    fn transition(&self, next: SessionState) -> Result<(), JsonRpcError> {
        self.state
            .lock()
            .expect("session state mutex poisoned")
            .transition(next)
            .map_err(|e| internal_error(e.to_string()))
    }

    async fn handle_initialize(&self, params: Value) -> Result<Value, JsonRpcError> {
        let requested = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        let version = negotiate_version(requested);

        self.transition(SessionState::Initializing)?;

        Ok(json!({
            "protocolVersion": version,
            "serverInfo": { "name": self.info.name, "version": self.info.version },
            "capabilities": server_capabilities(),
        }))
    }

    fn handle_initialized(&self) {
        if let Err(e) = self.transition(SessionState::Ready) {
            warn!(error = ?e, "received 'initialized' outside the initializing state");
        }
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .list()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    #[instrument(skip(self, params, cancellation))]
    async fn handle_tools_call(
        &self,
        params: Value,
        cancellation: CancellationToken,
    ) -> Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_param("name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let tool = self.tools.get(name).ok_or_else(|| not_found(&format!("tool '{name}'")))?;

        schema::validate(&tool.input_schema(), &arguments).map_err(invalid_params)?;

        let task_request = params.get("task").and_then(Value::as_object);

        if let Some(task_request) = task_request {
            let ttl_secs = task_request.get("ttl").and_then(Value::as_i64);
            let task = self.tasks.create(ttl_secs).await;
            let task_id = task.task_id.clone();

            let tasks = self.tasks.clone();
            let tool = tool.clone();
            let tool_name = name.to_string();
            let task_token = task.cancellation.clone();
            tokio::spawn(async move {
                let update = tokio::select! {
                    outcome = tool.execute(arguments, task_token.clone()) => {
                        match outcome {
                            Ok(result) => tasks.update(&task_id, TaskStatus::Completed, Some(result), None).await,
                            Err(e) => {
                                tasks
                                    .update(&task_id, TaskStatus::Failed, None, Some(format!("tool '{tool_name}' failed: {e}")))
                                    .await
                            }
                        }
                    }
                    _ = task_token.cancelled() => {
                        tasks.update(&task_id, TaskStatus::Cancelled, None, None).await
                    }
                };
                if let Err(e) = update {
                    warn!(error = %e, %task_id, "failed to record task completion");
                }
            });

            return Ok(task_envelope(&task.task_id, "working"));
        }

        tokio::select! {
            result = tool.execute(arguments, cancellation.clone()) => {
                result.map(tool_result_envelope).map_err(|e| tool_error(name, e.as_ref()))
            }
            _ = cancellation.cancelled() => {
                Err(JsonRpcError {
                    code: error_codes::INTERNAL_ERROR,
                    message: format!("tool '{name}' call was cancelled"),
                    data: None,
                })
            }
        }
    }

    async fn handle_tasks_get(&self, params: Value) -> Result<Value, JsonRpcError> {
        let task_id = params
            .get("taskId")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_param("taskId"))?;
        let task = self.tasks.get(task_id).await.map_err(|e| not_found(&e.to_string()))?;
        Ok(task_snapshot(&task))
    }

    async fn handle_tasks_result(&self, params: Value) -> Result<Value, JsonRpcError> {
        let task_id = params
            .get("taskId")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_param("taskId"))?;
        let timeout = params
            .get("timeoutSecs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_result_timeout);

        let task = self
            .tasks
            .await_result(task_id, timeout)
            .await
            .map_err(|e| not_found(&e.to_string()))?;
        Ok(task_snapshot(&task))
    }

    async fn handle_tasks_list(&self, params: Value) -> Result<Value, JsonRpcError> {
        let cursor = params.get("cursor").and_then(Value::as_str);
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(50) as usize;
        let page = self.tasks.list(cursor, limit).await;
        Ok(json!({
            "tasks": page.tasks.iter().map(task_snapshot).collect::<Vec<_>>(),
            "nextCursor": page.next_cursor,
        }))
    }

    async fn handle_tasks_cancel(&self, params: Value) -> Result<Value, JsonRpcError> {
        let task_id = params
            .get("taskId")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_param("taskId"))?;
        self.tasks.cancel(task_id).await.map_err(|e| not_found(&e.to_string()))?;
        let task = self.tasks.get(task_id).await.map_err(|e| not_found(&e.to_string()))?;
        Ok(task_snapshot(&task))
    }
}

fn task_snapshot(task: &conduit_tasks::Task) -> Value {
    json!({
        "taskId": task.task_id,
        "status": task.status,
        "progress": { "step": task.progress.step, "message": task.progress.message },
        "result": task.result,
        "error": task.error,
    })
}

#[async_trait]
impl IncomingHandler for McpServerHandler {
    #[instrument(skip(self, params, cancellation), fields(method))]
    async fn handle_request(
        &self,
        method: &str,
        params: Value,
        cancellation: CancellationToken,
    ) -> Result<Value, JsonRpcError> {
        if !self.state().accepts(method) && method != "initialize" {
            return Err(invalid_state(method, self.state()));
        }

        match method {
            "initialize" => {
                if self.state() != SessionState::New {
                    return Err(invalid_state(method, self.state()));
                }
                self.handle_initialize(params).await
            }
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(params, cancellation).await,
            "tasks/get" => self.handle_tasks_get(params).await,
            "tasks/result" => self.handle_tasks_result(params).await,
            "tasks/list" => self.handle_tasks_list(params).await,
            "tasks/cancel" => self.handle_tasks_cancel(params).await,
            other => Err(unknown_method(other)),
        }
    }

    async fn handle_notification(&self, method: &str, _params: Value) {
        match method {
            "initialized" => {
                info!("session initialized, moving to ready");
                self.handle_initialized();
            }
            "notifications/cancelled" => {
                // Correlation with in-flight requests is handled by the
                // dispatcher itself before this notification ever reaches
                // a handler.
            }
            other => {
                warn!(method = other, "ignoring unrecognized notification");
            }
        }
    }
}
