//! Incremental decoder for chat-completion server-sent events

use super::LlmError;
use serde::Deserialize;

#[derive(Debug, PartialEq)]
pub enum SseEvent {
    /// A non-empty content delta
    Delta(String),
    /// `data: [DONE]`
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Splits a byte stream into SSE lines and decodes the `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk, returning the events it completed
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, LlmError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&line)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Decode whatever remains once the byte stream has ended
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, LlmError> {
        let rest = std::mem::take(&mut self.buffer);
        Ok(decode_line(&rest)?.into_iter().collect())
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<SseEvent>, LlmError> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| LlmError::Stream(format!("invalid UTF-8 in event stream: {}", e)))?
        .trim_end_matches(['\r', '\n']);

    // Comments, event names and blank separators carry no content
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|e| LlmError::Stream(format!("malformed chunk: {}", e)))?;

    if let Some(error) = payload.error {
        return Err(LlmError::Stream(error.message));
    }

    let content: String = payload
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    Ok((!content.is_empty()).then_some(SseEvent::Delta(content)))
}
