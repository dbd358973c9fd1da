//! Chat session orchestration
//!
//! A [`ChatSession`] is the per-connection context object: it owns exactly one
//! query pipeline, built once at session start, and relays each answer to the
//! transport token by token.
//!
//! ```text
//! Uninitialized --start ok--> Ready --message--> Querying --done/error--> Ready
//!       |
//!       +--start failed--> Uninitialized (permanently)
//! ```

use crate::error::{DocentError, Result};
use crate::pipeline::{PipelineFactory, QueryPipeline, SourceRef};
use crate::prompt::compose_query;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No pipeline; either start has not run or it failed
    Uninitialized,
    /// Pipeline built, waiting for a message
    Ready,
    /// A query is being answered
    Querying,
}

/// Outbound half of the chat transport for one response
#[async_trait]
pub trait ResponseSink: Send {
    /// Report the passages the answer draws on, before any token
    async fn sources(&mut self, sources: &[SourceRef]) -> Result<()>;

    /// Forward one text increment as soon as it is produced
    async fn stream_token(&mut self, token: &str) -> Result<()>;

    /// Finalize the response after the last token
    async fn send(&mut self, content: &str) -> Result<()>;
}

/// Per-connection chat context
pub struct ChatSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    state: SessionState,
    pipeline: Option<Arc<dyn QueryPipeline>>,
    start_attempted: bool,
    init_error: Option<String>,
    query_timeout: Duration,
}

impl ChatSession {
    pub fn new(query_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: SessionState::Uninitialized,
            pipeline: None,
            start_attempted: false,
            init_error: None,
            query_timeout,
        }
    }

    /// Build this session's pipeline. Runs at most once per session.
    pub async fn start(&mut self, factory: &dyn PipelineFactory) -> Result<()> {
        if self.start_attempted {
            return Err(DocentError::NotInitialized(
                "session start already attempted".to_string(),
            ));
        }
        self.start_attempted = true;

        match factory.build().await {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.state = SessionState::Ready;
                tracing::info!(session = %self.id, "Session ready");
                Ok(())
            }
            Err(e) => {
                tracing::error!(session = %self.id, "Session start failed: {}", e);
                self.init_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Answer one user message, streaming tokens into `sink`.
    ///
    /// Returns the assembled answer. Failures are scoped to this message:
    /// the session is back in `Ready` afterwards.
    pub async fn handle_message(
        &mut self,
        message: &str,
        sink: &mut dyn ResponseSink,
        cancel: CancellationToken,
    ) -> Result<String> {
        let pipeline = match &self.pipeline {
            Some(pipeline) => Arc::clone(pipeline),
            None => {
                let reason = self
                    .init_error
                    .clone()
                    .unwrap_or_else(|| "no pipeline for this session".to_string());
                return Err(DocentError::NotInitialized(reason));
            }
        };

        self.state = SessionState::Querying;
        let query = compose_query(message);

        let outcome = tokio::time::timeout(
            self.query_timeout,
            relay(pipeline.as_ref(), &query, sink, cancel.clone()),
        )
        .await;

        self.state = SessionState::Ready;

        match outcome {
            Ok(Ok(answer)) => {
                tracing::debug!(session = %self.id, chars = answer.len(), "Response sent");
                Ok(answer)
            }
            Ok(Err(e)) => {
                tracing::warn!(session = %self.id, "Query failed: {}", e);
                Err(e)
            }
            Err(_) => {
                cancel.cancel();
                tracing::warn!(session = %self.id, "Query timed out after {:?}", self.query_timeout);
                Err(DocentError::QueryTimeout(self.query_timeout))
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Session duration so far
    pub fn duration(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

async fn relay(
    pipeline: &dyn QueryPipeline,
    query: &str,
    sink: &mut dyn ResponseSink,
    cancel: CancellationToken,
) -> Result<String> {
    let mut response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DocentError::Cancelled),
        response = pipeline.query(query, cancel.clone()) => response?,
    };

    let sources = response.sources();
    for source in &sources {
        tracing::debug!(
            id = %source.id,
            score = source.score,
            file = source.file_name.as_deref().unwrap_or("-"),
            "Source"
        );
    }
    sink.sources(&sources).await?;

    let mut answer = String::new();
    while let Some(token) = response.tokens.next().await {
        let token = token?;
        sink.stream_token(&token).await?;
        answer.push_str(&token);
    }

    sink.send(&answer).await?;
    Ok(answer)
}
