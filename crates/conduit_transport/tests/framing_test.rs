//! Tests for frame detection, encoding, and decoding.

use conduit_transport::{classify, IncomingMessage};
use serde_json::json;

#[test]
fn classify_request_with_id() {
    let value = json!({"jsonrpc": "2.0", "id": 1, "method": "ping", "params": {}});
    match classify(value).expect("should classify") {
        IncomingMessage::Request { id, method, .. } => {
            assert_eq!(method, "ping");
            assert_eq!(id.to_string(), "1");
        }
        other => panic!("expected Request, got {other:?}"),
    }
}

#[test]
fn classify_notification_has_no_id() {
    let value = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {"requestId": 7}});
    match classify(value).expect("should classify") {
        IncomingMessage::Notification { method, .. } => {
            assert_eq!(method, "notifications/cancelled");
        }
        other => panic!("expected Notification, got {other:?}"),
    }
}

#[test]
fn classify_success_response() {
    let value = json!({"jsonrpc": "2.0", "id": "abc", "result": {"ok": true}});
    match classify(value).expect("should classify") {
        IncomingMessage::Response { id, result } => {
            assert_eq!(id.to_string(), "abc");
            assert!(result.is_ok());
        }
        other => panic!("expected Response, got {other:?}"),
    }
}

#[test]
fn classify_error_response() {
    let value = json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -32601, "message": "not found"}});
    match classify(value).expect("should classify") {
        IncomingMessage::Response { result, .. } => {
            let err = result.expect_err("expected error result");
            assert_eq!(err.code, -32601);
        }
        other => panic!("expected Response, got {other:?}"),
    }
}

#[test]
fn classify_rejects_shapeless_object() {
    let value = json!({"jsonrpc": "2.0"});
    assert!(classify(value).is_none());
}
