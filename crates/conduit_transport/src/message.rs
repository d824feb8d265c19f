//! JSON-RPC 2.0 message shapes and the logic that tells them apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC request id: either a number or a string, per the spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    Str(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes this crate produces directly.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// A classified incoming message: the three shapes JSON-RPC 2.0 allows.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response (has both `method` and `id`)
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    /// A notification, no response expected (has `method`, no `id`)
    Notification { method: String, params: Value },
    /// A response to a request this side sent earlier
    Response {
        id: RequestId,
        result: Result<Value, JsonRpcError>,
    },
}

/// Classify a raw JSON value into one of the three JSON-RPC message shapes.
///
/// Returns `None` if the value has neither `method` nor a `result`/`error`
/// pair alongside an `id` — i.e. it is not a well-formed JSON-RPC message.
pub fn classify(value: Value) -> Option<IncomingMessage> {
    let obj = value.as_object()?;

    if let Some(method) = obj.get("method").and_then(Value::as_str) {
        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        return Some(match obj.get("id") {
            Some(id_value) => IncomingMessage::Request {
                id: serde_json::from_value(id_value.clone()).ok()?,
                method: method.to_string(),
                params,
            },
            None => IncomingMessage::Notification {
                method: method.to_string(),
                params,
            },
        });
    }

    let id: RequestId = serde_json::from_value(obj.get("id")?.clone()).ok()?;
    if let Some(error) = obj.get("error") {
        let err: JsonRpcError = serde_json::from_value(error.clone()).ok()?;
        return Some(IncomingMessage::Response {
            id,
            result: Err(err),
        });
    }
    let result = obj.get("result").cloned().unwrap_or(Value::Null);
    Some(IncomingMessage::Response {
        id,
        result: Ok(result),
    })
}

/// Build the wire JSON for an outgoing request.
pub fn encode_request(id: &RequestId, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Build the wire JSON for an outgoing notification.
pub fn encode_notification(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

/// Build the wire JSON for a successful response.
pub fn encode_response(id: &RequestId, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Build the wire JSON for an error response.
pub fn encode_error(id: &RequestId, error: JsonRpcError) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
}
