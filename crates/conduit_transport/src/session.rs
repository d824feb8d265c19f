//! A `Session` pairs a transport's read and write halves with the framing
//! negotiated for it. It never allows more than one reader to exist at a
//! time: `split` hands out a `SessionReader` that is not `Clone`, so the
//! single-reader invariant is enforced by the type system rather than by
//! convention.
//!
//! Framing is not negotiated eagerly at construction — that would block a
//! side that speaks first waiting for bytes that may never come until it
//! writes. Instead outbound frames default to `Content-Length` (the MCP/LSP
//! convention) until this side's reader actually observes a bare `{` on the
//! wire, at which point both halves switch to newline framing to match the
//! peer.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use conduit_error::{TransportError, TransportErrorKind};

use crate::framing::{self, Framing};
use crate::message::{self, IncomingMessage};

type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;
type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

#[derive(Clone)]
struct SharedFraming(Arc<AtomicBool>);

impl SharedFraming {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn get(&self) -> Framing {
        if self.0.load(Ordering::Acquire) {
            Framing::Newline
        } else {
            Framing::ContentLength
        }
    }

    fn set(&self, framing: Framing) {
        self.0
            .store(matches!(framing, Framing::Newline), Ordering::Release);
    }
}

/// A connected transport, not yet split into its reader/writer halves.
pub struct Session {
    reader: BufReader<BoxedReader>,
    writer: BoxedWriter,
    framing: SharedFraming,
}

impl Session {
    /// Build a session over arbitrary already-connected reader/writer halves.
    pub fn from_parts<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self {
            reader: BufReader::new(Box::pin(reader) as BoxedReader),
            writer: Box::pin(writer),
            framing: SharedFraming::new(),
        }
    }

    /// Build a session over the process's stdin/stdout.
    pub fn from_stdio() -> Self {
        Self::from_parts(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Build a session over an already-accepted/connected Unix stream.
    pub fn from_unix_stream(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::from_parts(read_half, write_half)
    }

    /// Accept one connection from `listener` and build a session over it.
    pub async fn accept_unix(listener: &UnixListener) -> Result<Self, TransportError> {
        let (stream, _addr) = listener
            .accept()
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Io(e.to_string())))?;
        Ok(Self::from_unix_stream(stream))
    }

    /// Binds a Unix socket at `path` with owner-only (`0600`) permissions,
    /// per spec §4.A. A stale socket left behind by an unclean shutdown is
    /// removed and rebound rather than treated as "already in use".
    pub fn bind_unix(path: &std::path::Path) -> Result<UnixListener, TransportError> {
        if path.exists() && std::os::unix::net::UnixStream::connect(path).is_err() {
            // Nothing is listening: a stale socket left by an unclean
            // shutdown. A live socket at this path instead falls through
            // to `bind`, which fails with `AddrInUse` as it should.
            std::fs::remove_file(path)
                .map_err(|e| TransportError::new(TransportErrorKind::Io(format!("removing stale socket {}: {e}", path.display()))))?;
        }
        let listener = UnixListener::bind(path)
            .map_err(|e| TransportError::new(TransportErrorKind::Io(format!("binding {}: {e}", path.display()))))?;
        std::fs::set_permissions(path, std::os::unix::fs::PermissionsExt::from_mode(0o600))
            .map_err(|e| TransportError::new(TransportErrorKind::Io(format!("chmod {}: {e}", path.display()))))?;
        Ok(listener)
    }

    /// Split into an exclusive reader and a cheaply-cloneable writer.
    pub fn split(self) -> (SessionReader, SessionWriter) {
        let reader = SessionReader {
            reader: self.reader,
            framing: self.framing.clone(),
        };
        let writer = SessionWriter {
            writer: Arc::new(Mutex::new(self.writer)),
            framing: self.framing,
        };
        (reader, writer)
    }
}

/// The exclusive read half of a session. Not `Clone` by design — only the
/// task that owns this value may call `recv`.
pub struct SessionReader {
    reader: BufReader<BoxedReader>,
    framing: SharedFraming,
}

impl SessionReader {
    /// Read and classify the next message, or `Ok(None)` on clean EOF.
    pub async fn recv(&mut self) -> Result<Option<IncomingMessage>, TransportError> {
        loop {
            let observed = framing::detect_framing(&mut self.reader).await?;
            self.framing.set(observed);
            let Some(text) = framing::read_frame(&mut self.reader, observed).await? else {
                return Ok(None);
            };
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| TransportError::new(TransportErrorKind::FramingError(format!(
                    "invalid JSON: {e}"
                ))))?;
            if let Some(message) = message::classify(value) {
                return Ok(Some(message));
            }
            // Not a recognizable JSON-RPC shape; skip it rather than kill the session.
        }
    }
}

/// A cheaply-cloneable handle to a session's write half. Many callers may
/// hold one concurrently; writes serialize through an internal mutex so no
/// two frames interleave on the wire.
#[derive(Clone)]
pub struct SessionWriter {
    writer: Arc<Mutex<BoxedWriter>>,
    framing: SharedFraming,
}

impl SessionWriter {
    /// Serialize `value` and write it as one frame, using whatever framing
    /// this session's reader has most recently observed (Content-Length
    /// until the peer is seen writing bare newline-delimited JSON).
    pub async fn send(&self, value: Value) -> Result<(), TransportError> {
        let text = serde_json::to_string(&value)
            .map_err(|e| TransportError::new(TransportErrorKind::FramingError(e.to_string())))?;
        let mut writer = self.writer.lock().await;
        framing::write_frame(&mut *writer, self.framing.get(), &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn bind_unix_sets_owner_only_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit.sock");
        let listener = Session::bind_unix(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        drop(listener);
    }

    #[test]
    fn bind_unix_removes_a_stale_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit.sock");
        {
            let listener = Session::bind_unix(&path).unwrap();
            drop(listener);
        }
        // `path` still exists on disk (UnixListener doesn't unlink on drop)
        // but nothing is listening on it anymore.
        assert!(path.exists());
        assert!(Session::bind_unix(&path).is_ok());
    }
}
