//! Integration tests for the single-reader dispatcher, driven over an
//! in-process loopback transport (`tokio::io::duplex`).

use std::sync::Arc;

use async_trait::async_trait;
use conduit_transport::{Dispatcher, IncomingHandler, JsonRpcError, Session};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

struct EchoHandler;

#[async_trait]
impl IncomingHandler for EchoHandler {
    async fn handle_request(
        &self,
        method: &str,
        params: Value,
        _cancellation: CancellationToken,
    ) -> Result<Value, JsonRpcError> {
        if method == "fail" {
            return Err(JsonRpcError {
                code: -32000,
                message: "intentional failure".to_string(),
                data: None,
            });
        }
        Ok(json!({"echoed": params}))
    }

    async fn handle_notification(&self, _method: &str, _params: Value) {}
}

/// Write one `Content-Length`-framed body, the framing a dispatcher's
/// outbound side defaults to before it has observed anything else.
async fn write_cl_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, body: &str) {
    writer
        .write_all(format!("Content-Length: {}\r\n\r\n{}", body.len(), body).as_bytes())
        .await
        .unwrap();
}

/// Read one `Content-Length`-framed body back off the wire.
async fn read_cl_frame<R: tokio::io::AsyncBufReadExt + Unpin>(reader: &mut R) -> String {
    let mut content_length = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(value.trim().parse::<usize>().unwrap());
        }
    }
    let mut body = vec![0u8; content_length.expect("missing Content-Length header")];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body)
        .await
        .unwrap();
    String::from_utf8(body).unwrap()
}

/// Build a dispatcher wired to one end of an in-process duplex pipe, and
/// hand back the other end as a raw peer for manual frame inspection.
fn loopback() -> (Dispatcher, tokio::io::DuplexStream) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let (our_read, our_write) = tokio::io::split(ours);
    let session = Session::from_parts(our_read, our_write);
    let (dispatcher, _task) = Dispatcher::spawn(session, Arc::new(EchoHandler));
    (dispatcher, theirs)
}

#[tokio::test]
async fn call_round_trips_through_a_peer_acting_as_server() {
    let (dispatcher, peer) = loopback();
    let (peer_read, mut peer_write) = tokio::io::split(peer);
    let mut peer_read = BufReader::new(peer_read);

    let call = tokio::spawn(async move { dispatcher.call("ping", json!({"n": 1})).await });

    let sent: Value = serde_json::from_str(&read_cl_frame(&mut peer_read).await).unwrap();
    assert_eq!(sent["method"], "ping");
    let id = sent["id"].clone();

    let response = json!({"jsonrpc": "2.0", "id": id, "result": {"pong": true}}).to_string();
    write_cl_frame(&mut peer_write, &response).await;

    let result = call.await.unwrap().expect("call should succeed");
    assert_eq!(result["pong"], true);
}

#[tokio::test]
async fn peer_initiated_request_is_echoed_back() {
    let (_dispatcher, peer) = loopback();
    let (peer_read, mut peer_write) = tokio::io::split(peer);
    let mut peer_read = BufReader::new(peer_read);

    write_cl_frame(
        &mut peer_write,
        r#"{"jsonrpc":"2.0","id":9,"method":"echo","params":{"x":1}}"#,
    )
    .await;

    let response: Value = serde_json::from_str(&read_cl_frame(&mut peer_read).await).unwrap();
    assert_eq!(response["id"], 9);
    assert_eq!(response["result"]["echoed"]["x"], 1);
}

#[tokio::test]
async fn peer_initiated_request_propagates_handler_error() {
    let (_dispatcher, peer) = loopback();
    let (peer_read, mut peer_write) = tokio::io::split(peer);
    let mut peer_read = BufReader::new(peer_read);

    write_cl_frame(
        &mut peer_write,
        r#"{"jsonrpc":"2.0","id":3,"method":"fail","params":{}}"#,
    )
    .await;

    let response: Value = serde_json::from_str(&read_cl_frame(&mut peer_read).await).unwrap();
    assert_eq!(response["error"]["code"], -32000);
}
