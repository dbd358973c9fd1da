//! API keys resolved once at startup

use crate::config::Config;
use crate::error::{DocentError, Result};
use std::fmt;

/// API keys for the three provider roles.
///
/// Read from each provider's key variable (`GROQ_API_KEY`, `OPENAI_API_KEY`,
/// ...) unless the config names another one; a `.env` file in
/// the working directory is loaded first. Never refreshed afterwards.
#[derive(Clone, Default)]
pub struct Credentials {
    embedding: Option<String>,
    llm: Option<String>,
    rerank: Option<String>,
}

impl Credentials {
    /// Resolve keys from the process environment
    pub fn from_env(config: &Config) -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve keys with a custom lookup (environment, secret store, tests)
    pub fn from_lookup(config: &Config, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            embedding: get(&config.embedding.key_env()),
            llm: get(&config.llm.key_env()),
            rerank: get(&config.rerank.key_env()),
        }
    }

    pub fn with_embedding(mut self, key: impl Into<String>) -> Self {
        self.embedding = Some(key.into());
        self
    }

    pub fn with_llm(mut self, key: impl Into<String>) -> Self {
        self.llm = Some(key.into());
        self
    }

    pub fn with_rerank(mut self, key: impl Into<String>) -> Self {
        self.rerank = Some(key.into());
        self
    }

    pub fn embedding_key(&self, config: &Config) -> Result<&str> {
        required(
            self.embedding.as_deref(),
            &config.embedding.provider,
            &config.embedding.key_env(),
        )
    }

    pub fn llm_key(&self, config: &Config) -> Result<&str> {
        required(self.llm.as_deref(), &config.llm.provider, &config.llm.key_env())
    }

    pub fn rerank_key(&self, config: &Config) -> Result<&str> {
        required(
            self.rerank.as_deref(),
            &config.rerank.provider,
            &config.rerank.key_env(),
        )
    }
}

fn required<'a>(key: Option<&'a str>, provider: &str, env: &str) -> Result<&'a str> {
    key.ok_or_else(|| DocentError::MissingCredential {
        provider: provider.to_string(),
        env: env.to_string(),
    })
}

// Keys must never reach logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("embedding", &mask(&self.embedding))
            .field("llm", &mask(&self.llm))
            .field("rerank", &mask(&self.rerank))
            .finish()
    }
}
