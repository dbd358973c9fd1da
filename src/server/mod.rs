// Chat host: one session per Unix socket connection

mod client;
mod protocol;
mod signals;

pub use client::{ChatClient, SessionStatus};
pub use protocol::{
    read_frame, remote_error, write_frame, ChatEvent, ChatRequest, MAX_FRAME_SIZE,
};
pub use signals::SignalHandler;

use crate::error::{DocentError, Result};
use crate::pipeline::{PipelineFactory, SourceRef};
use crate::session::{ChatSession, ResponseSink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Grace period for open sessions after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Unix domain socket chat server
pub struct ChatServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    factory: Arc<dyn PipelineFactory>,
    connections: Arc<Semaphore>,
    query_timeout: Duration,
}

impl ChatServer {
    pub fn new(
        socket_path: PathBuf,
        factory: Arc<dyn PipelineFactory>,
        max_connections: usize,
        query_timeout: Duration,
    ) -> Self {
        Self {
            socket_path,
            listener: None,
            factory,
            connections: Arc::new(Semaphore::new(max_connections)),
            query_timeout,
        }
    }

    /// Bind to the socket path and start listening
    pub async fn bind(&mut self) -> Result<()> {
        // Remove a stale socket left by a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| DocentError::Io {
                source: e,
                context: format!("Failed to remove existing socket: {:?}", self.socket_path),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocentError::Io {
                source: e,
                context: format!("Failed to create socket directory: {:?}", parent),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| DocentError::Io {
            source: e,
            context: format!("Failed to bind to socket: {:?}", self.socket_path),
        })?;

        self.listener = Some(listener);

        tracing::info!("Chat server listening on {:?}", self.socket_path);
        Ok(())
    }

    /// Serve until SIGINT, SIGTERM or SIGHUP
    pub async fn run_until_signal(&mut self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let mut signals = SignalHandler::new()?;

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            signals.wait().await;
            trigger.cancel();
        });

        self.run(shutdown).await
    }

    /// Accept connections until `shutdown` is cancelled
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| DocentError::Server("Server not bound".to_string()))?;

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _addr)) => stream,
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let permit = match Arc::clone(&self.connections).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!("Connection limit reached, rejecting client");
                            tokio::spawn(reject(stream));
                            continue;
                        }
                    };

                    let factory = Arc::clone(&self.factory);
                    let query_timeout = self.query_timeout;
                    let session_shutdown = shutdown.child_token();
                    sessions.spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, factory, query_timeout, session_shutdown).await
                        {
                            tracing::error!("Connection handler error: {}", e);
                        }
                        drop(permit);
                    });
                }

                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}

                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        drop(listener);

        // Open sessions see the cancelled token and wind down
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!("Aborting {} sessions after grace period", sessions.len());
            sessions.abort_all();
        }

        self.cleanup()?;
        tracing::info!("Chat server stopped");
        Ok(())
    }

    /// Remove the socket file
    pub fn cleanup(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| DocentError::Io {
                source: e,
                context: format!("Failed to remove socket: {:?}", self.socket_path),
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Writes response events as frames
struct FrameSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameSink<W> {
    async fn event(&mut self, event: &ChatEvent) -> Result<()> {
        write_frame(&mut self.writer, event).await
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ResponseSink for FrameSink<W> {
    async fn sources(&mut self, sources: &[SourceRef]) -> Result<()> {
        self.event(&ChatEvent::Sources {
            sources: sources.to_vec(),
        })
        .await
    }

    async fn stream_token(&mut self, token: &str) -> Result<()> {
        self.event(&ChatEvent::Token {
            text: token.to_string(),
        })
        .await
    }

    async fn send(&mut self, content: &str) -> Result<()> {
        self.event(&ChatEvent::Done {
            content: content.to_string(),
        })
        .await
    }
}

async fn reject(stream: UnixStream) {
    let mut sink = FrameSink { writer: stream };
    let event = ChatEvent::session_error(&DocentError::Server(
        "server is at its connection limit".to_string(),
    ));
    if let Err(e) = sink.event(&event).await {
        tracing::debug!("Failed to notify rejected client: {}", e);
    }
}

/// Forward client frames into a channel so reads never race the response writer
async fn read_requests(mut reader: OwnedReadHalf, tx: mpsc::Sender<ChatRequest>) {
    loop {
        match read_frame::<_, ChatRequest>(&mut reader).await {
            Ok(Some(request)) => {
                if tx.send(request).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Dropping client after bad frame: {}", e);
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    factory: Arc<dyn PipelineFactory>,
    query_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel(16);
    let reader = tokio::spawn(read_requests(read_half, tx));
    let mut sink = FrameSink { writer: write_half };

    let mut session = ChatSession::new(query_timeout);
    tracing::info!(session = %session.id(), "Session opened");

    let started = tokio::select! {
        started = session.start(factory.as_ref()) => started,
        _ = shutdown.cancelled() => {
            reader.abort();
            return Ok(());
        }
    };

    match started {
        Ok(()) => {
            sink.event(&ChatEvent::Ready {
                session_id: session.id().to_string(),
            })
            .await?
        }
        Err(e) => sink.event(&ChatEvent::session_error(&e)).await?,
    }

    let mut pending: VecDeque<ChatRequest> = VecDeque::new();
    let mut closing = false;

    while !closing {
        let request = match pending.pop_front() {
            Some(request) => Some(request),
            None => tokio::select! {
                request = rx.recv() => request,
                _ = shutdown.cancelled() => None,
            },
        };

        let content = match request {
            Some(ChatRequest::Message { content }) => content,
            // Nothing in flight
            Some(ChatRequest::Cancel) => continue,
            Some(ChatRequest::End) | None => break,
        };

        let session_id = session.id();
        let cancel = shutdown.child_token();
        let result = {
            let answer = session.handle_message(&content, &mut sink, cancel.clone());
            tokio::pin!(answer);

            loop {
                tokio::select! {
                    result = &mut answer => break result,
                    request = rx.recv(), if !closing => match request {
                        Some(ChatRequest::Cancel) => {
                            tracing::debug!(session = %session_id, "Cancel requested");
                            cancel.cancel();
                        }
                        Some(message @ ChatRequest::Message { .. }) => pending.push_back(message),
                        Some(ChatRequest::End) | None => {
                            closing = true;
                            cancel.cancel();
                        }
                    },
                }
            }
        };

        if let Err(e) = result {
            if let Err(write_err) = sink.event(&ChatEvent::error(&e)).await {
                if closing {
                    tracing::debug!("Client gone before error delivery: {}", write_err);
                } else {
                    reader.abort();
                    return Err(write_err);
                }
            }
        }
    }

    reader.abort();
    tracing::info!(
        session = %session.id(),
        seconds = session.duration().num_seconds(),
        "Session closed"
    );
    Ok(())
}
