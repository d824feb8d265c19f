//! One live connection to a downstream MCP server child process: spawn,
//! handshake, and the `tools/list` / `tools/call` surface used by a
//! workflow's `tool` steps.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use conduit_error::{DownstreamError, DownstreamErrorKind};
use conduit_interface::ToolDescriptor;
use conduit_transport::{error_codes, Dispatcher, IncomingHandler, JsonRpcError, Session};

use crate::client::{DownstreamServerConfig, ProgressSink};

/// conduit speaks the same MCP revision downstream that it serves upstream.
/// Kept as a local constant rather than depending on `conduit_protocol`: a
/// downstream client has no business depending on the server-side state
/// machine crate just for one string literal.
const PROTOCOL_VERSION: &str = "2025-06-18";

/// Routes unsolicited traffic from a downstream server: progress
/// notifications are forwarded to the sink, everything else this side
/// doesn't support is rejected (downstream servers are not expected to
/// issue sampling or roots requests back at conduit).
struct ProgressHandler {
    server: String,
    sink: Option<Arc<dyn ProgressSink>>,
}

#[async_trait]
impl IncomingHandler for ProgressHandler {
    async fn handle_request(&self, method: &str, _params: Value, _cancellation: CancellationToken) -> Result<Value, JsonRpcError> {
        Err(JsonRpcError {
            code: error_codes::METHOD_NOT_FOUND,
            message: format!("conduit does not serve '{method}' to downstream servers"),
            data: None,
        })
    }

    async fn handle_notification(&self, method: &str, params: Value) {
        if method == "notifications/progress" {
            if let Some(sink) = &self.sink {
                sink.forward(&self.server, params);
            }
        }
    }
}

/// A spawned or socket-connected downstream MCP server, past its
/// `initialize` handshake and ready to take `tools/list` / `tools/call`
/// requests. `child` is only populated when this side owns a spawned
/// process to reap on shutdown; a socket connection has nothing to kill.
pub struct Connection {
    name: String,
    dispatcher: Dispatcher,
    child: Option<Mutex<Child>>,
}

impl Connection {
    /// Connects to `config`. When `nested` is true and `config` carries a
    /// `socket_path`, dials that Unix socket instead of spawning a child
    /// process over fresh stdio pipes — see [`DownstreamServerConfig`] for
    /// why a nested conduit must not do the latter.
    #[instrument(skip(config, sink), fields(server = %config.name, nested))]
    pub async fn connect(
        config: &DownstreamServerConfig,
        sink: Option<Arc<dyn ProgressSink>>,
        nested: bool,
    ) -> Result<Self, DownstreamError> {
        if nested {
            if let Some(path) = &config.socket_path {
                return Self::connect_socket(config, path, sink).await;
            }
        }
        Self::connect_spawn(config, sink).await
    }

    async fn connect_socket(
        config: &DownstreamServerConfig,
        socket_path: &std::path::Path,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<Self, DownstreamError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            DownstreamError::new(DownstreamErrorKind::ConnectFailed(format!(
                "{}: connecting to {}: {e}",
                config.name,
                socket_path.display()
            )))
        })?;
        let session = Session::from_unix_stream(stream);
        let handler = Arc::new(ProgressHandler { server: config.name.clone(), sink });
        let (dispatcher, _reader_task) = Dispatcher::spawn(session, handler);

        let connection = Self { name: config.name.clone(), dispatcher, child: None };
        connection.handshake().await?;
        Ok(connection)
    }

    async fn connect_spawn(config: &DownstreamServerConfig, sink: Option<Arc<dyn ProgressSink>>) -> Result<Self, DownstreamError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| DownstreamError::new(DownstreamErrorKind::ConnectFailed(format!("{}: {e}", config.name))))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DownstreamError::new(DownstreamErrorKind::ConnectFailed("child has no stdin".to_string())))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownstreamError::new(DownstreamErrorKind::ConnectFailed("child has no stdout".to_string())))?;

        let session = Session::from_parts(stdout, stdin);
        let handler = Arc::new(ProgressHandler { server: config.name.clone(), sink });
        let (dispatcher, _reader_task) = Dispatcher::spawn(session, handler);

        let connection = Self { name: config.name.clone(), dispatcher, child: Some(Mutex::new(child)) };
        connection.handshake().await?;
        Ok(connection)
    }

    async fn handshake(&self) -> Result<(), DownstreamError> {
        self.dispatcher
            .call(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "conduit", "version": env!("CARGO_PKG_VERSION") },
                }),
            )
            .await
            .map_err(|e| DownstreamError::new(DownstreamErrorKind::ConnectFailed(format!("{}: initialize failed: {e}", self.name))))?;

        self.dispatcher
            .notify("notifications/initialized", json!({}))
            .await
            .map_err(|e| DownstreamError::new(DownstreamErrorKind::ConnectFailed(format!("{}: initialized notify failed: {e}", self.name))))?;

        Ok(())
    }

    #[instrument(skip(self, arguments), fields(server = %self.name, tool))]
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, DownstreamError> {
        let result = self
            .dispatcher
            .call("tools/call", json!({ "name": tool, "arguments": arguments }))
            .await
            .map_err(|e| {
                DownstreamError::new(DownstreamErrorKind::ToolCallFailed { tool: tool.to_string(), message: e.to_string() })
            })?;

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(DownstreamError::new(DownstreamErrorKind::ToolCallFailed {
                tool: tool.to_string(),
                message: result.get("content").cloned().unwrap_or(Value::Null).to_string(),
            }));
        }
        Ok(result)
    }

    #[instrument(skip(self), fields(server = %self.name))]
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, DownstreamError> {
        let result = self
            .dispatcher
            .call("tools/list", json!({}))
            .await
            .map_err(|e| DownstreamError::new(DownstreamErrorKind::ConnectFailed(format!("{}: tools/list failed: {e}", self.name))))?;

        let raw_tools = result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(raw_tools
            .into_iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                Some(ToolDescriptor {
                    name: obj.get("name")?.as_str()?.to_string(),
                    description: obj.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                    input_schema: obj.get("inputSchema").cloned().unwrap_or_else(|| json!({})),
                })
            })
            .collect())
    }

    /// Kills the child process, if this connection owns one. MCP over
    /// stdio has no graceful shutdown handshake; closing the pipes and
    /// reaping the process is the documented way to end a session. A
    /// socket-based connection owns no process and just drops its stream.
    pub async fn shutdown(&self) {
        let Some(child) = &self.child else { return };
        let mut child = child.lock().await;
        if let Err(e) = child.start_kill() {
            warn!(server = %self.name, error = %e, "failed to kill downstream server process");
        }
        let _ = child.wait().await;
    }
}
