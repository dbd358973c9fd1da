//! Query embedding
//!
//! - [`EmbeddingProvider`] trait for abstraction
//! - [`GeminiEmbedding`] for Google's hosted embedding models
//! - [`FastEmbedProvider`] for local embedding (all-MiniLM-L6-v2, 384-dim)
mod gemini;
mod provider;

pub use gemini::{GeminiEmbedding, DEFAULT_GEMINI_BASE_URL};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use crate::config::{parse_duration, Config, Credentials};
use crate::error::{DocentError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Build the embedding provider selected by `[embedding].provider`
pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Arc<dyn EmbeddingProvider>> {
    let section = &config.embedding;
    let timeout = parse_duration(&section.timeout).unwrap_or(Duration::from_secs(30));

    let provider: Arc<dyn EmbeddingProvider> = match section.provider.as_str() {
        "gemini" => {
            let key = credentials.embedding_key(config)?;
            Arc::new(GeminiEmbedding::new(
                &section.model,
                key,
                section.base_url.as_deref(),
                timeout,
            )?)
        }
        "fastembed" => Arc::new(FastEmbedProvider::new(&section.model)?),
        other => {
            return Err(DocentError::InvalidConfigValue {
                path: "embedding.provider".to_string(),
                message: format!("Unknown embedding provider '{}'", other),
            })
        }
    };

    Ok(provider)
}
