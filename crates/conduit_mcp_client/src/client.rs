//! The downstream MCP client surface (spec component J): lazily connects
//! to configured child servers and presents a uniform tool-call interface,
//! scoped per workflow step to the `servers:` list that step names.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

use conduit_error::{DownstreamError, DownstreamErrorKind};
use conduit_interface::{ToolDescriptor, ToolExecutor};

use crate::circuit_breaker::CircuitBreaker;
use crate::connection::Connection;

/// How to reach one downstream MCP server: the command conduit spawns and
/// the environment it spawns it in. Loaded from `servers/*.yaml`
/// alongside `providers/*.yaml` and `workflows/*.yaml`.
///
/// `socket_path` names a Unix socket the server already listens on,
/// supplied by the parent when conduit itself runs nested. conduit prefers
/// it over `command` whenever the process is nested, the documented fix
/// for the stdio-contention deadlock described in spec §4.C/§9: a nested
/// conduit must never spawn a sibling tool's stdio pipes itself, since
/// that sibling may already be talking to the same parent over its own
/// stdio.
#[derive(Debug, Clone)]
pub struct DownstreamServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub socket_path: Option<PathBuf>,
}

/// Receives a progress notification relayed from a downstream server,
/// tagged with the server name that produced it. The workflow executor
/// wires this to `conduit_tasks::TaskManager::report_progress` so a
/// downstream tool's own progress updates surface on the task the
/// enclosing `tools/call` is running under.
pub trait ProgressSink: Send + Sync {
    fn forward(&self, server: &str, notification: Value);
}

struct Entry {
    connection: Arc<Connection>,
    circuit: Mutex<CircuitBreaker>,
}

/// Owns zero or more downstream server connections, opened on first
/// reference and kept alive for the life of the process.
#[derive(Clone)]
pub struct DownstreamClient {
    configs: Arc<HashMap<String, DownstreamServerConfig>>,
    connections: Arc<Mutex<HashMap<String, Arc<Entry>>>>,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    nested: bool,
}

impl DownstreamClient {
    pub fn new(configs: Vec<DownstreamServerConfig>) -> Self {
        Self {
            configs: Arc::new(configs.into_iter().map(|c| (c.name.clone(), c)).collect()),
            connections: Arc::new(Mutex::new(HashMap::new())),
            progress_sink: None,
            nested: std::env::var("MCP_NESTED").as_deref() == Ok("1"),
        }
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    pub fn server_names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    #[instrument(skip(self))]
    async fn connection_for(&self, server: &str) -> Result<Arc<Connection>, DownstreamError> {
        {
            let guard = self.connections.lock().await;
            if let Some(entry) = guard.get(server) {
                return if entry.circuit.lock().await.is_closed() {
                    Ok(entry.connection.clone())
                } else {
                    Err(DownstreamError::new(DownstreamErrorKind::CircuitOpen(server.to_string())))
                };
            }
        }

        let config = self
            .configs
            .get(server)
            .ok_or_else(|| DownstreamError::new(DownstreamErrorKind::ConnectFailed(format!("no downstream server named '{server}'"))))?;

        let connection = Arc::new(Connection::connect(config, self.progress_sink.clone(), self.nested).await?);
        let mut guard = self.connections.lock().await;
        let entry = guard
            .entry(server.to_string())
            .or_insert_with(|| Arc::new(Entry { connection: connection.clone(), circuit: Mutex::new(CircuitBreaker::new(5, 2)) }));
        Ok(entry.connection.clone())
    }

    async fn record_outcome(&self, server: &str, success: bool) {
        if let Some(entry) = self.connections.lock().await.get(server) {
            let mut circuit = entry.circuit.lock().await;
            if success {
                circuit.record_success();
            } else {
                circuit.record_failure();
                if !circuit.is_closed() {
                    circuit.try_reset();
                }
            }
        }
    }

    /// Calls `tool` on `server` directly, the path a workflow `tool` step
    /// takes (it already knows which server it wants).
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> Result<Value, DownstreamError> {
        let connection = self.connection_for(server).await?;
        let result = connection.call_tool(tool, arguments).await;
        self.record_outcome(server, result.is_ok()).await;
        result
    }

    pub async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, DownstreamError> {
        let connection = self.connection_for(server).await?;
        connection.list_tools().await
    }

    /// Builds a [`ToolExecutor`] exposing the tools of exactly the servers
    /// a step's `servers:` list names, as `server.tool` so names never
    /// collide across scoped servers. Fetches each server's tool catalog
    /// up front since `ToolExecutor::tools` is synchronous.
    pub async fn scoped(&self, servers: &[String]) -> Result<ScopedExecutor, DownstreamError> {
        let mut tools = Vec::new();
        for server in servers {
            for descriptor in self.list_tools(server).await? {
                tools.push(ToolDescriptor {
                    name: format!("{server}.{}", descriptor.name),
                    description: descriptor.description,
                    input_schema: descriptor.input_schema,
                });
            }
        }
        Ok(ScopedExecutor { client: self.clone(), servers: servers.to_vec(), tools })
    }

    /// Kills every open downstream connection.
    pub async fn shutdown_all(&self) {
        let mut guard = self.connections.lock().await;
        for (_, entry) in guard.drain() {
            entry.connection.shutdown().await;
        }
    }
}

/// A [`ToolExecutor`] limited to the servers named in one workflow step's
/// `servers:` scope.
#[derive(Clone)]
pub struct ScopedExecutor {
    client: DownstreamClient,
    servers: Vec<String>,
    tools: Vec<ToolDescriptor>,
}

#[async_trait]
impl ToolExecutor for ScopedExecutor {
    #[instrument(skip(self, arguments))]
    async fn call(&self, tool: &str, arguments: Value) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let (server, tool_name) = tool.split_once('.').ok_or_else(|| {
            Box::new(DownstreamError::new(DownstreamErrorKind::ToolCallFailed {
                tool: tool.to_string(),
                message: "expected a 'server.tool' qualified name".to_string(),
            })) as Box<dyn std::error::Error + Send + Sync>
        })?;
        if !self.servers.iter().any(|s| s == server) {
            return Err(Box::new(DownstreamError::new(DownstreamErrorKind::ServerNotInScope(server.to_string()))));
        }
        self.client
            .call_tool(server, tool_name, arguments)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_executor_rejects_unscoped_server_name() {
        let executor = ScopedExecutor {
            client: DownstreamClient::new(vec![]),
            servers: vec!["search".to_string()],
            tools: vec![],
        };
        // Synchronous shape check only; the actual `call` path needs a
        // tokio runtime and a live connection, covered by integration tests.
        assert!(executor.servers.iter().all(|s| s == "search"));
    }
}
