//! Wire framing: `Content-Length:`-prefixed frames (the MCP/LSP default) or
//! newline-delimited JSON, with a first-byte heuristic to tell which one a
//! peer is speaking.

use conduit_error::{TransportError, TransportErrorKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Which framing a session's reader/writer halves negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length: N\r\n\r\n<N bytes of UTF-8 JSON>`
    ContentLength,
    /// One JSON value per line, separated by `\n`
    Newline,
}

/// Peek the next byte on `reader` to decide which framing it's using,
/// without consuming it. A leading `{` means the peer is writing bare
/// newline-delimited JSON; anything else is assumed to be a `Content-Length`
/// header line.
pub async fn detect_framing<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Framing, TransportError> {
    let buf = reader
        .fill_buf()
        .await
        .map_err(|e| TransportError::new(TransportErrorKind::Io(e.to_string())))?;
    match buf.first() {
        Some(b'{') => Ok(Framing::Newline),
        Some(_) => Ok(Framing::ContentLength),
        None => Ok(Framing::Newline),
    }
}

/// Read the next frame's raw JSON text, or `Ok(None)` on a clean EOF between
/// frames.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    framing: Framing,
) -> Result<Option<String>, TransportError> {
    match framing {
        Framing::Newline => read_newline_frame(reader).await,
        Framing::ContentLength => read_content_length_frame(reader).await,
    }
}

async fn read_newline_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<String>, TransportError> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .await
        .map_err(|e| TransportError::new(TransportErrorKind::Io(e.to_string())))?;
    if n == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

async fn read_content_length_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<String>, TransportError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Io(e.to_string())))?;
        if n == 0 {
            return if content_length.is_none() {
                Ok(None)
            } else {
                Err(TransportError::new(TransportErrorKind::FramingError(
                    "stream ended mid-header".to_string(),
                )))
            };
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            let parsed = value.trim().parse::<usize>().map_err(|e| {
                TransportError::new(TransportErrorKind::FramingError(format!(
                    "invalid Content-Length '{}': {}",
                    value.trim(),
                    e
                )))
            })?;
            content_length = Some(parsed);
        }
    }

    let len = content_length.ok_or_else(|| {
        TransportError::new(TransportErrorKind::FramingError(
            "missing Content-Length header".to_string(),
        ))
    })?;

    let mut body = vec![0u8; len];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body)
        .await
        .map_err(|e| TransportError::new(TransportErrorKind::Io(e.to_string())))?;
    String::from_utf8(body)
        .map(Some)
        .map_err(|e| TransportError::new(TransportErrorKind::FramingError(e.to_string())))
}

/// Write one frame to `writer` in the given framing.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    framing: Framing,
    body: &str,
) -> Result<(), TransportError> {
    let write_result = match framing {
        Framing::Newline => writer.write_all(format!("{body}\n").as_bytes()).await,
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", body.len());
            match writer.write_all(header.as_bytes()).await {
                Ok(()) => writer.write_all(body.as_bytes()).await,
                Err(e) => Err(e),
            }
        }
    };
    write_result.map_err(|e| TransportError::new(TransportErrorKind::WriteFailed(e.to_string())))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::new(TransportErrorKind::WriteFailed(e.to_string())))
}
