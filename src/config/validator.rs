use crate::config::{parse_duration, Config};
use crate::error::{DocentError, Result, ValidationError};

const EMBEDDING_PROVIDERS: [&str; 2] = ["gemini", "fastembed"];
const LLM_PROVIDERS: [&str; 2] = ["groq", "openai"];
const RERANK_PROVIDERS: [&str; 2] = ["cohere", "fastembed"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_rerank(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_server(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocentError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when a session loads the index, not here
        if config.storage.persist_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.persist_dir",
                "Index directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::validate_provider(
            "embedding.provider",
            &config.embedding.provider,
            &EMBEDDING_PROVIDERS,
            errors,
        );

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        Self::validate_duration("embedding.timeout", &config.embedding.timeout, errors);
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::validate_provider("llm.provider", &config.llm.provider, &LLM_PROVIDERS, errors);

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.llm.max_tokens == Some(0) {
            errors.push(ValidationError::new(
                "llm.max_tokens",
                "max_tokens must be greater than 0 when set",
            ));
        }

        Self::validate_duration("llm.timeout", &config.llm.timeout, errors);
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::validate_provider(
            "rerank.provider",
            &config.rerank.provider,
            &RERANK_PROVIDERS,
            errors,
        );

        if config.rerank.top_n == 0 {
            errors.push(ValidationError::new(
                "rerank.top_n",
                "top_n must be greater than 0",
            ));
        }

        Self::validate_duration("rerank.timeout", &config.rerank.timeout, errors);
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.similarity_top_k < config.rerank.top_n {
            errors.push(ValidationError::new(
                "retrieval.similarity_top_k",
                format!(
                    "similarity_top_k ({}) must be at least rerank.top_n ({})",
                    retrieval.similarity_top_k, config.rerank.top_n
                ),
            ));
        }

        if retrieval.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if retrieval.hnsw_ef_construction == 0 || retrieval.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_ef",
                "HNSW ef parameters must be greater than 0",
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.socket_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "server.socket_path",
                "Socket path cannot be empty",
            ));
        }

        if config.server.max_connections == 0 {
            errors.push(ValidationError::new(
                "server.max_connections",
                "max_connections must be greater than 0",
            ));
        }

        Self::validate_duration(
            "session.query_timeout",
            &config.session.query_timeout,
            errors,
        );
    }

    fn validate_provider(
        path: &str,
        provider: &str,
        valid: &[&str],
        errors: &mut Vec<ValidationError>,
    ) {
        if !valid.contains(&provider) {
            errors.push(ValidationError::new(
                path,
                format!("Provider must be one of {:?}, got '{}'", valid, provider),
            ));
        }
    }

    fn validate_duration(path: &str, value: &str, errors: &mut Vec<ValidationError>) {
        match parse_duration(value) {
            Some(d) if !d.is_zero() => {}
            _ => errors.push(ValidationError::new(
                path,
                format!("Invalid duration format: {}", value),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = "mystery".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_top_k_smaller_than_top_n() {
        let mut config = Config::default();
        config.retrieval.similarity_top_k = 1;
        config.rerank.top_n = 2;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.rerank.top_n = 0;
        config.session.query_timeout = "whenever".to_string();
        config.llm.temperature = 3.0;

        match ConfigValidator::validate(&config) {
            Err(DocentError::ConfigValidation { errors }) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"rerank.top_n"));
                assert!(paths.contains(&"session.query_timeout"));
                assert!(paths.contains(&"llm.temperature"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
