//! The single-reader dispatcher.
//!
//! Exactly one task — the one spawned by [`Dispatcher::spawn`] — ever calls
//! [`SessionReader::recv`]. Everything else goes through the cloneable
//! [`Dispatcher`] handle, which demultiplexes by `id` for pending replies,
//! `method` for server-initiated requests and notifications it routes to an
//! [`IncomingHandler`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use conduit_error::{TransportError, TransportErrorKind};

use crate::message::{self, IncomingMessage, JsonRpcError, RequestId};
use crate::session::{Session, SessionReader, SessionWriter};

/// Handles requests and notifications this side did not initiate.
#[async_trait]
pub trait IncomingHandler: Send + Sync {
    /// Handle a server-initiated request and produce its result or error.
    /// `cancellation` fires if the peer sends `notifications/cancelled`
    /// naming this request's id before the handler returns.
    async fn handle_request(
        &self,
        method: &str,
        params: Value,
        cancellation: CancellationToken,
    ) -> Result<Value, JsonRpcError>;

    /// Handle a notification. No response is possible.
    async fn handle_notification(&self, method: &str, params: Value);
}

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, JsonRpcError>>>>>;
type CancelMap = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

/// Cloneable handle onto a dispatched session. Safe to share across tasks:
/// outbound calls serialize through the session writer's own mutex, and
/// this type never reads the transport itself.
#[derive(Clone)]
pub struct Dispatcher {
    writer: SessionWriter,
    pending: PendingMap,
    inbound_cancel: CancelMap,
    next_id: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Spawn the reader loop over `session`, routing incoming requests and
    /// notifications to `handler`. Returns the dispatcher handle plus the
    /// reader task's join handle, which resolves when the transport closes.
    pub fn spawn(session: Session, handler: Arc<dyn IncomingHandler>) -> (Self, JoinHandle<()>) {
        let (reader, writer) = session.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let inbound_cancel: CancelMap = Arc::new(Mutex::new(HashMap::new()));

        let dispatcher = Self {
            writer: writer.clone(),
            pending: pending.clone(),
            inbound_cancel: inbound_cancel.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
        };

        let task = tokio::spawn(read_loop(reader, writer, handler, pending, inbound_cancel));
        (dispatcher, task)
    }

    /// Issue a request and await its response.
    #[instrument(skip(self, params))]
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let frame = message::encode_request(&id, method, params);
        if let Err(e) = self.writer.send(frame).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TransportError::new(TransportErrorKind::FramingError(
                format!("{} (code {})", err.message, err.code),
            ))),
            Err(_) => Err(TransportError::new(TransportErrorKind::Closed)),
        }
    }

    /// Send a notification; no response is expected.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        self.writer
            .send(message::encode_notification(method, params))
            .await
    }

    /// Stop waiting on a pending outbound call without notifying the peer.
    pub async fn abandon(&self, id: &RequestId) {
        self.pending.lock().await.remove(id);
    }
}

#[instrument(skip_all)]
async fn read_loop(
    mut reader: SessionReader,
    writer: SessionWriter,
    handler: Arc<dyn IncomingHandler>,
    pending: PendingMap,
    inbound_cancel: CancelMap,
) {
    loop {
        let message = match reader.recv().await {
            Ok(Some(m)) => m,
            Ok(None) => {
                debug!("transport closed, ending read loop");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read frame, ending read loop");
                break;
            }
        };

        match message {
            IncomingMessage::Response { id, result } => {
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(result);
                } else {
                    warn!(%id, "response for unknown or already-resolved request id");
                }
            }
            IncomingMessage::Notification { method, params } => {
                if method == "notifications/cancelled" {
                    if let Some(id) = params
                        .get("requestId")
                        .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok())
                    {
                        if let Some(token) = inbound_cancel.lock().await.remove(&id) {
                            token.cancel();
                        }
                    }
                }
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.handle_notification(&method, params).await;
                });
            }
            IncomingMessage::Request { id, method, params } => {
                let token = CancellationToken::new();
                inbound_cancel
                    .lock()
                    .await
                    .insert(id.clone(), token.clone());
                let handler = handler.clone();
                let writer = writer.clone();
                let inbound_cancel = inbound_cancel.clone();
                tokio::spawn(async move {
                    let outcome = handler.handle_request(&method, params, token).await;
                    inbound_cancel.lock().await.remove(&id);
                    let frame = match outcome {
                        Ok(result) => message::encode_response(&id, result),
                        Err(err) => message::encode_error(&id, err),
                    };
                    if let Err(e) = writer.send(frame).await {
                        warn!(error = %e, "failed to write response frame");
                    }
                });
            }
        }
    }
}
