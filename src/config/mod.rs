//! Configuration management for Docent
//!
//! Configuration is read from a TOML file, then environment overrides
//! (`DOCENT_SECTION__KEY=value`) and an optional profile are applied on top.
//! API keys never live in the file: each provider section names the
//! environment variable holding its key, resolved once into [`Credentials`].

use crate::error::{DocentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod credentials;
mod validator;

pub use credentials::Credentials;
pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub rerank: RerankConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Location of the persisted document index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub persist_dir: PathBuf,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "gemini" or "fastembed"
    pub provider: String,
    pub model: String,
    /// Overrides the provider's conventional key variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout: String,
}

/// Chat-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "groq" or "openai"
    pub provider: String,
    pub model: String,
    /// Overrides the provider's conventional key variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub timeout: String,
}

/// Reranking post-processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// "cohere" or "fastembed"
    pub provider: String,
    pub model: String,
    /// Overrides the provider's conventional key variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Number of reranked candidates handed to the language model
    pub top_n: usize,
    pub timeout: String,
}

impl EmbeddingConfig {
    /// Environment variable holding this provider's key
    pub fn key_env(&self) -> String {
        key_env(&self.provider, self.api_key_env.as_deref())
    }
}

impl LlmConfig {
    pub fn key_env(&self) -> String {
        key_env(&self.provider, self.api_key_env.as_deref())
    }
}

impl RerankConfig {
    pub fn key_env(&self) -> String {
        key_env(&self.provider, self.api_key_env.as_deref())
    }
}

/// Explicit `api_key_env`, else `<PROVIDER>_API_KEY` (GEMINI, GROQ, OPENAI, COHERE)
fn key_env(provider: &str, explicit: Option<&str>) -> String {
    match explicit {
        Some(env) => env.to_string(),
        None => format!("{}_API_KEY", provider.to_ascii_uppercase()),
    }
}

/// Vector retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest neighbours fetched before reranking
    pub similarity_top_k: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

/// Chat host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub max_connections: usize,
}

/// Per-session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Deadline for one query, including the whole token stream
    pub query_timeout: String,
    /// Embed a probe string at session start to verify the embedding
    /// service and its dimension against the index
    #[serde(default = "default_true")]
    pub probe_embedding: bool,
}

fn default_true() -> bool {
    true
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_api_key_env: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocentError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocentError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocentError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| DocentError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(env) = overrides.embedding_api_key_env {
            self.embedding.api_key_env = Some(env);
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(env) = overrides.llm_api_key_env {
            self.llm.api_key_env = Some(env);
        }
        if let Some(provider) = overrides.rerank_provider {
            self.rerank.provider = provider;
        }
        if let Some(model) = overrides.rerank_model {
            self.rerank.model = model;
        }
        if let Some(env) = overrides.rerank_api_key_env {
            self.rerank.api_key_env = Some(env);
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCENT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DOCENT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__PERSIST_DIR" => self.storage.persist_dir = PathBuf::from(value),
            "EMBEDDING__PROVIDER" => self.embedding.provider = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__API_KEY_ENV" => self.embedding.api_key_env = Some(value.to_string()),
            "EMBEDDING__BASE_URL" => self.embedding.base_url = Some(value.to_string()),
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__API_KEY_ENV" => self.llm.api_key_env = Some(value.to_string()),
            "LLM__BASE_URL" => self.llm.base_url = Some(value.to_string()),
            "LLM__TEMPERATURE" => self.llm.temperature = parse_env_value(path, value)?,
            "RERANK__PROVIDER" => self.rerank.provider = value.to_string(),
            "RERANK__MODEL" => self.rerank.model = value.to_string(),
            "RERANK__API_KEY_ENV" => self.rerank.api_key_env = Some(value.to_string()),
            "RERANK__BASE_URL" => self.rerank.base_url = Some(value.to_string()),
            "RERANK__TOP_N" => self.rerank.top_n = parse_env_value(path, value)?,
            "RETRIEVAL__SIMILARITY_TOP_K" => {
                self.retrieval.similarity_top_k = parse_env_value(path, value)?
            }
            "SERVER__SOCKET_PATH" => self.server.socket_path = PathBuf::from(value),
            "SESSION__QUERY_TIMEOUT" => self.session.query_timeout = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Query deadline as a [`Duration`]
    pub fn query_timeout(&self) -> Duration {
        parse_duration(&self.session.query_timeout).unwrap_or(Duration::from_secs(120))
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocentError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docent").join("config.toml"))
    }
}

fn parse_env_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DocentError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                persist_dir: PathBuf::from("./storage"),
            },
            embedding: EmbeddingConfig {
                provider: "gemini".to_string(),
                model: "models/embedding-001".to_string(),
                api_key_env: None,
                base_url: None,
                timeout: "30s".to_string(),
            },
            llm: LlmConfig {
                provider: "groq".to_string(),
                model: "mixtral-8x7b-32768".to_string(),
                api_key_env: None,
                base_url: None,
                temperature: 0.1,
                max_tokens: None,
                timeout: "120s".to_string(),
            },
            rerank: RerankConfig {
                provider: "cohere".to_string(),
                model: "rerank-english-v2.0".to_string(),
                api_key_env: None,
                base_url: None,
                top_n: 2,
                timeout: "30s".to_string(),
            },
            retrieval: RetrievalConfig {
                similarity_top_k: 10,
                hnsw_m: 16,
                hnsw_ef_construction: 200,
                hnsw_ef_search: 64,
            },
            server: ServerConfig {
                socket_path: PathBuf::from("~/.docent/docent.sock"),
                max_connections: 32,
            },
            session: SessionConfig {
                query_timeout: "120s".to_string(),
                probe_embedding: true,
            },
            profiles: HashMap::new(),
        }
    }
}

/// Parse duration strings such as "30s", "500ms", "2m" or a bare number of seconds
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();

    // "ms" before "s" because "ms" ends with "s"
    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        value.parse().ok().map(Duration::from_secs)
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde(Path::new("~/.docent")), home.join(".docent"));
        assert_eq!(
            expand_tilde(Path::new("/tmp/docent")),
            PathBuf::from("/tmp/docent")
        );
    }

    #[test]
    fn test_defaults_match_retrieval_shape() {
        let config = Config::default();
        assert_eq!(config.retrieval.similarity_top_k, 10);
        assert_eq!(config.rerank.top_n, 2);
        assert_eq!(config.query_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.llm.model = "llama3-70b-8192".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.llm.model, "llama3-70b-8192");
        assert_eq!(loaded.storage.persist_dir, PathBuf::from("./storage"));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                embedding_provider: Some("fastembed".to_string()),
                embedding_model: Some("all-MiniLM-L6-v2".to_string()),
                rerank_provider: Some("fastembed".to_string()),
                ..Default::default()
            },
        );

        config.apply_profile("offline").unwrap();
        assert_eq!(config.embedding.provider, "fastembed");
        assert_eq!(config.rerank.provider, "fastembed");
        assert_eq!(config.llm.provider, "groq");

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_key_env_follows_provider() {
        let mut config = Config::default();
        assert_eq!(config.embedding.key_env(), "GEMINI_API_KEY");
        assert_eq!(config.llm.key_env(), "GROQ_API_KEY");
        assert_eq!(config.rerank.key_env(), "COHERE_API_KEY");

        config.profiles.insert(
            "openai".to_string(),
            ProfileOverrides {
                llm_provider: Some("openai".to_string()),
                ..Default::default()
            },
        );
        config.profiles.insert(
            "custom".to_string(),
            ProfileOverrides {
                llm_api_key_env: Some("MY_LLM_KEY".to_string()),
                ..Default::default()
            },
        );

        config.apply_profile("openai").unwrap();
        assert_eq!(config.llm.key_env(), "OPENAI_API_KEY");

        config.apply_profile("custom").unwrap();
        assert_eq!(config.llm.key_env(), "MY_LLM_KEY");
    }

    #[test]
    fn test_env_override_key_env() {
        let mut config = Config::default();
        config.set_value_from_env("LLM__PROVIDER", "openai").unwrap();
        assert_eq!(config.llm.key_env(), "OPENAI_API_KEY");

        config
            .set_value_from_env("LLM__API_KEY_ENV", "TEAM_OPENAI_KEY")
            .unwrap();
        assert_eq!(config.llm.key_env(), "TEAM_OPENAI_KEY");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/docent.toml")).unwrap_err();
        assert!(matches!(err, DocentError::ConfigNotFound { .. }));
    }
}
