//! Streaming client for OpenAI-compatible chat-completion APIs (Groq, OpenAI)

use super::sse::{SseDecoder, SseEvent};
use super::{LanguageModel, LlmError, TokenStream};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completion client configuration
#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    /// Provider label used in logs
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

/// Language model speaking the `/chat/completions` protocol with `stream: true`
pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: ChatCompletionConfig,
}

impl ChatCompletionClient {
    pub fn new(config: ChatCompletionConfig) -> Result<Self, LlmError> {
        // Connect timeout only: the request timeout would cut off long streams,
        // whose deadline is owned by the session
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
            "stream": true,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    async fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<TokenStream, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        tracing::debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "Starting completion stream"
        );

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(prompt))
            .send();

        let resp = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            resp = request => resp?,
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(TokenStream::new(sse_tokens(resp.bytes_stream()), cancel))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn a raw SSE byte stream into content deltas, in arrival order
pub fn sse_tokens<S, B>(bytes: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            if let Some(token) = state.pending.pop_front() {
                return Some((Ok(token), Some(state)));
            }
            if state.done {
                return None;
            }

            let decoded = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(LlmError::from(e)), None)),
                None => {
                    state.done = true;
                    state.decoder.finish()
                }
            };

            match decoded {
                Ok(events) => {
                    for event in events {
                        match event {
                            SseEvent::Delta(text) => state.pending.push_back(text),
                            SseEvent::Done => state.done = true,
                        }
                    }
                }
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
}
