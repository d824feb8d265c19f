//! Builds the runtime from a config directory and serves it over stdio and,
//! if `MCP_SOCKET_PATH` is set, a Unix socket too (spec §6 "Unix socket").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use conduit_mcp_client::{DownstreamClient, ProgressSink};
use conduit_protocol::{McpServerHandler, ServerInfo};
use conduit_tasks::TaskManager;
use conduit_transport::{Dispatcher, Session};
use conduit_workflow::{build_workflow_tools, WorkflowRuntime};

use crate::config;

/// Relays a downstream server's progress notifications to the log. There is
/// no task to attribute them to at this layer — that association lives in
/// the step that issued the call, which already sees its own `tasks/call`
/// progress through the task manager.
struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn forward(&self, server: &str, notification: Value) {
        info!(server, ?notification, "downstream progress notification");
    }
}

pub async fn run(config_dir: PathBuf, retry_attempts: u32) -> anyhow::Result<()> {
    let loaded = config::load(&config_dir, retry_attempts)?;

    let downstream = DownstreamClient::new(loaded.servers).with_progress_sink(Arc::new(LoggingProgressSink));
    let runtime = WorkflowRuntime::new(loaded.workflows, loaded.providers, downstream, loaded.sandbox);
    let tools = conduit_interface::ToolRegistry::from_tools(build_workflow_tools(&runtime));

    info!(tools = tools.list().len(), "loaded workflow tools");

    let tasks = TaskManager::new();
    tasks.spawn_sweeper();

    let handler = Arc::new(McpServerHandler::new(
        ServerInfo { name: "conduit".into(), version: env!("CARGO_PKG_VERSION").into() },
        tools,
        tasks,
    ));

    let socket_path = std::env::var("MCP_SOCKET_PATH").ok().map(PathBuf::from);

    match socket_path {
        Some(path) => serve_stdio_and_socket(handler, &path).await,
        None => serve_stdio(handler).await,
    }
}

async fn serve_stdio(handler: Arc<McpServerHandler>) -> anyhow::Result<()> {
    let session = Session::from_stdio();
    let (_dispatcher, join) = Dispatcher::spawn(session, handler);
    join.await?;
    Ok(())
}

/// Serves stdio and a Unix socket concurrently. Each accepted connection
/// (and stdio itself) gets its own single-reader [`Dispatcher`]; the
/// `McpServerHandler` is shared, so every session sees the same tool set
/// and task manager regardless of which transport it came in on.
async fn serve_stdio_and_socket(handler: Arc<McpServerHandler>, socket_path: &Path) -> anyhow::Result<()> {
    let listener = Session::bind_unix(socket_path)?;
    info!(path = %socket_path.display(), "listening on unix socket");

    let stdio_handler = handler.clone();
    let stdio_task = tokio::spawn(async move {
        let session = Session::from_stdio();
        let (_dispatcher, join) = Dispatcher::spawn(session, stdio_handler);
        let _ = join.await;
    });

    let accept_loop = async {
        loop {
            match Session::accept_unix(&listener).await {
                Ok(session) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let (_dispatcher, join) = Dispatcher::spawn(session, handler);
                        let _ = join.await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "unix socket accept failed");
                }
            }
        }
    };

    tokio::select! {
        _ = stdio_task => {}
        _ = accept_loop => {}
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}
