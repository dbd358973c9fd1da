//! Cancellable token stream

use super::LlmError;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

/// Lazy, forward-only sequence of text increments.
///
/// Finite and not restartable. The attached cancellation token is checked
/// at every yield point: once cancelled, the stream yields a single
/// [`LlmError::Cancelled`] and ends. An error from the producer also ends it.
pub struct TokenStream {
    inner: BoxStream<'static, Result<String, LlmError>>,
}

impl TokenStream {
    pub fn new<S>(source: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<String, LlmError>> + Send + 'static,
    {
        let state = Some((source.boxed(), cancel));

        let inner = futures::stream::unfold(state, |state| async move {
            let (mut source, cancel) = state?;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Some((Err(LlmError::Cancelled), None)),
                item = source.next() => match item {
                    Some(Ok(token)) => Some((Ok(token), Some((source, cancel)))),
                    Some(Err(e)) => Some((Err(e), None)),
                    None => None,
                },
            }
        })
        .boxed();

        Self { inner }
    }

    /// Stream over an already-known sequence of tokens
    pub fn from_tokens<I>(tokens: I, cancel: CancellationToken) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(tokens.into_iter().map(Ok)), cancel)
    }

    /// Drain the stream into one string
    pub async fn collect_text(mut self) -> Result<String, LlmError> {
        let mut text = String::new();
        while let Some(token) = self.next().await {
            text.push_str(&token?);
        }
        Ok(text)
    }
}

impl Stream for TokenStream {
    type Item = Result<String, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
