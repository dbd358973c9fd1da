//! Language-model clients
//!
//! Every backend produces answers as a [`TokenStream`]; OpenAI-compatible
//! providers (Groq, OpenAI) stream real incremental deltas over SSE.

mod openai_compat;
mod sse;
mod stream;

pub use openai_compat::{
    sse_tokens, ChatCompletionClient, ChatCompletionConfig, GROQ_BASE_URL, OPENAI_BASE_URL,
};
pub use sse::{SseDecoder, SseEvent};
pub use stream::TokenStream;

use crate::config::{parse_duration, Config, Credentials};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Generation cancelled")]
    Cancelled,
}

/// A language model that answers a prompt with a token stream
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Start generating; tokens arrive lazily through the returned stream
    async fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> std::result::Result<TokenStream, LlmError>;

    fn model_name(&self) -> &str;
}

/// Build the language model selected by `[llm].provider`
pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Arc<dyn LanguageModel>> {
    let section = &config.llm;

    let default_base = match section.provider.as_str() {
        "groq" => GROQ_BASE_URL,
        "openai" => OPENAI_BASE_URL,
        other => {
            return Err(DocentError::InvalidConfigValue {
                path: "llm.provider".to_string(),
                message: format!("Unknown LLM provider '{}'", other),
            })
        }
    };

    let api_key = credentials.llm_key(config)?;

    let client = ChatCompletionClient::new(ChatCompletionConfig {
        provider: section.provider.clone(),
        base_url: section
            .base_url
            .clone()
            .unwrap_or_else(|| default_base.to_string()),
        api_key: api_key.to_string(),
        model: section.model.clone(),
        temperature: section.temperature,
        max_tokens: section.max_tokens,
        timeout: parse_duration(&section.timeout).unwrap_or(Duration::from_secs(120)),
    })?;

    Ok(Arc::new(client))
}
