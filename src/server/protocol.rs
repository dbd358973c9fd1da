// Chat wire protocol: length-prefixed JSON frames over a Unix domain socket

use crate::error::{DocentError, ErrorKind, Result};
use crate::pipeline::SourceRef;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (10MB)
pub const MAX_FRAME_SIZE: u32 = 10 * 1024 * 1024;

/// Frames sent by a chat client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatRequest {
    /// A user message to answer
    Message { content: String },
    /// Abort the response currently streaming
    Cancel,
    /// Close the session
    End,
}

/// Frames sent by the chat server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Session pipeline built; messages will be answered
    Ready { session_id: String },
    /// Session start failed; the session stays uninitialized
    SessionError { kind: ErrorKind, message: String },
    /// Passages the coming answer is grounded on; precedes the first token
    Sources { sources: Vec<SourceRef> },
    /// One streamed text increment
    Token { text: String },
    /// Response complete
    Done { content: String },
    /// The current message failed
    Error { kind: ErrorKind, message: String },
}

impl ChatEvent {
    pub fn error(err: &DocentError) -> Self {
        ChatEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn session_error(err: &DocentError) -> Self {
        ChatEvent::SessionError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Rebuild a local error from an error frame
pub fn remote_error(kind: ErrorKind, message: String) -> DocentError {
    match kind {
        ErrorKind::Cancelled => DocentError::Cancelled,
        ErrorKind::Protocol => DocentError::NotInitialized(message),
        ErrorKind::Provider => DocentError::Provider(message),
        ErrorKind::Configuration => DocentError::Config(message),
        _ => DocentError::Server(message),
    }
}

/// Read one frame. Returns `None` when the peer closed the stream between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    // Read 4-byte length prefix
    let length = match reader.read_u32().await {
        Ok(length) => length,
        Err(e) if e.kind() == IoErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(DocentError::Io {
                source: e,
                context: "Failed to read frame length".to_string(),
            })
        }
    };

    if length > MAX_FRAME_SIZE {
        return Err(DocentError::Server(format!(
            "Frame too large: {} bytes (max: {})",
            length, MAX_FRAME_SIZE
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    reader
        .read_exact(&mut buffer)
        .await
        .map_err(|e| DocentError::Io {
            source: e,
            context: "Failed to read frame payload".to_string(),
        })?;

    let frame = serde_json::from_slice(&buffer).map_err(|e| DocentError::Json {
        source: e,
        context: "Failed to deserialize chat frame".to_string(),
    })?;

    Ok(Some(frame))
}

/// Write one frame and flush
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(frame).map_err(|e| DocentError::Json {
        source: e,
        context: "Failed to serialize chat frame".to_string(),
    })?;

    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(DocentError::Server(format!(
            "Frame too large: {} bytes (max: {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    // Length prefix (4 bytes, big-endian)
    writer
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| DocentError::Io {
            source: e,
            context: "Failed to write frame length".to_string(),
        })?;

    writer
        .write_all(&payload)
        .await
        .map_err(|e| DocentError::Io {
            source: e,
            context: "Failed to write frame payload".to_string(),
        })?;

    writer.flush().await.map_err(|e| DocentError::Io {
        source: e,
        context: "Failed to flush frame".to_string(),
    })?;

    Ok(())
}
