//! Translates this crate's own errors, and errors bubbling up from a tool
//! body, into JSON-RPC error objects.

use serde_json::{json, Value};

use conduit_transport::{error_codes, JsonRpcError};

use crate::session_state::SessionState;

pub fn unknown_method(method: &str) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::METHOD_NOT_FOUND,
        message: format!("unknown method '{method}'"),
        data: None,
    }
}

pub fn invalid_state(method: &str, state: SessionState) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::INVALID_REQUEST,
        message: format!("method '{method}' is not valid in state {state:?}"),
        data: None,
    }
}

pub fn invalid_params(message: impl Into<String>) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::INVALID_PARAMS,
        message: message.into(),
        data: None,
    }
}

pub fn internal_error(message: impl Into<String>) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::INTERNAL_ERROR,
        message: message.into(),
        data: None,
    }
}

/// Wraps a tool execution failure the way §7 specifies: `code`,
/// one-line `message`, and optional `data` naming the underlying cause.
pub fn tool_error(tool_name: &str, cause: &(dyn std::error::Error + Send + Sync)) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::INTERNAL_ERROR,
        message: format!("tool '{tool_name}' failed: {cause}"),
        data: Some(json!({ "tool": tool_name })),
    }
}

pub fn not_found(what: &str) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::INVALID_PARAMS,
        message: format!("{what} not found"),
        data: None,
    }
}

pub fn missing_param(name: &str) -> JsonRpcError {
    invalid_params(format!("missing required parameter '{name}'"))
}

/// Builds the structured-content-bearing success envelope `tools/call`
/// returns for a synchronous invocation.
pub fn tool_result_envelope(result: Value) -> Value {
    let text = serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": result,
        "isError": false,
    })
}

/// Builds the immediate `tools/call` reply for a task-augmented
/// invocation: no content yet, just the task handle.
pub fn task_envelope(task_id: &str, status: &str) -> Value {
    json!({
        "content": [],
        "metadata": { "task_id": task_id, "status": status },
    })
}
