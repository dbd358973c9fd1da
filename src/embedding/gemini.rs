//! Gemini embedding client (Generative Language API, `embedContent`)

use super::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Remote embedding provider backed by Google's embedding models
pub struct GeminiEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedding {
    pub fn new(
        model: &str,
        api_key: &str,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        // The API addresses models as "models/<id>"
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let url = format!("{}/v1beta/{}:embedContent", self.base_url, self.model);
        let body = serde_json::json!({
            "model": self.model,
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_QUERY",
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedContentResponse = resp.json().await?;
        if parsed.embedding.values.is_empty() {
            return Err(EmbeddingError::GenerationError(
                "Empty embedding returned".to_string(),
            ));
        }

        tracing::debug!(
            model = %self.model,
            dim = parsed.embedding.values.len(),
            "Query embedded"
        );

        Ok(parsed.embedding.values)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_prefix() {
        let provider =
            GeminiEmbedding::new("embedding-001", "k", None, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.model_name(), "models/embedding-001");

        let provider =
            GeminiEmbedding::new("models/embedding-001", "k", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.model_name(), "models/embedding-001");
    }

    #[tokio::test]
    async fn test_empty_text_rejected_locally() {
        let provider = GeminiEmbedding::new(
            "embedding-001",
            "k",
            Some("http://127.0.0.1:9"),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(matches!(
            provider.embed("").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
