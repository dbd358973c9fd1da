// Chat client for the Unix socket server

use super::protocol::{read_frame, remote_error, write_frame, ChatEvent, ChatRequest};
use crate::error::{DocentError, ErrorKind, Result};
use crate::pipeline::SourceRef;
use std::future::Future;
use std::path::Path;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outcome of the server-side session start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Ready { session_id: String },
    Failed { kind: ErrorKind, message: String },
}

/// One chat session over the server socket
pub struct ChatClient {
    writer: OwnedWriteHalf,
    events: mpsc::Receiver<ChatEvent>,
    reader: JoinHandle<()>,
    status: SessionStatus,
    sources: Vec<SourceRef>,
}

impl ChatClient {
    /// Connect and wait for the session start outcome
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|e| DocentError::Io {
                source: e,
                context: format!("Failed to connect to chat server at {:?}", socket_path),
            })?;

        let (mut read_half, writer) = stream.into_split();
        let (tx, mut events) = mpsc::channel(64);

        let reader = tokio::spawn(async move {
            loop {
                match read_frame::<_, ChatEvent>(&mut read_half).await {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Chat server sent a bad frame: {}", e);
                        break;
                    }
                }
            }
        });

        let status = match events.recv().await {
            Some(ChatEvent::Ready { session_id }) => SessionStatus::Ready { session_id },
            Some(ChatEvent::SessionError { kind, message }) => {
                SessionStatus::Failed { kind, message }
            }
            Some(other) => {
                reader.abort();
                return Err(DocentError::Server(format!(
                    "Unexpected first event from server: {:?}",
                    other
                )));
            }
            None => {
                reader.abort();
                return Err(DocentError::Server(
                    "Chat server closed the connection".to_string(),
                ));
            }
        };

        Ok(Self {
            writer,
            events,
            reader,
            status,
            sources: Vec::new(),
        })
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Sources reported for the most recent answer
    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    /// Send a message and collect the streamed answer
    pub async fn ask<F>(&mut self, content: &str, on_token: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        self.ask_until(content, on_token, std::future::pending()).await
    }

    /// Like [`ask`](Self::ask), but sends a cancel frame once `interrupt` completes
    pub async fn ask_until<F, I>(
        &mut self,
        content: &str,
        mut on_token: F,
        interrupt: I,
    ) -> Result<String>
    where
        F: FnMut(&str),
        I: Future<Output = ()>,
    {
        write_frame(
            &mut self.writer,
            &ChatRequest::Message {
                content: content.to_string(),
            },
        )
        .await?;
        self.sources.clear();

        tokio::pin!(interrupt);
        let mut interrupted = false;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ChatEvent::Sources { sources }) => self.sources = sources,
                    Some(ChatEvent::Token { text }) => on_token(&text),
                    Some(ChatEvent::Done { content }) => return Ok(content),
                    Some(ChatEvent::Error { kind, message }) => {
                        return Err(remote_error(kind, message))
                    }
                    Some(other) => tracing::debug!("Ignoring event {:?}", other),
                    None => {
                        return Err(DocentError::Server(
                            "Chat server closed the connection".to_string(),
                        ))
                    }
                },
                _ = &mut interrupt, if !interrupted => {
                    interrupted = true;
                    write_frame(&mut self.writer, &ChatRequest::Cancel).await?;
                }
            }
        }
    }

    /// Close the session
    pub async fn end(mut self) -> Result<()> {
        let result = write_frame(&mut self.writer, &ChatRequest::End).await;
        self.reader.abort();
        result
    }
}
