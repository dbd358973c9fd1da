use docent::embedding::{EmbeddingError, EmbeddingProvider, GeminiEmbedding};
use docent::index::{Node, ScoredNode};
use docent::llm::{ChatCompletionClient, ChatCompletionConfig, LanguageModel, LlmError};
use docent::rerank::{CohereRerank, RerankError, Reranker};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn candidate(id: &str, text: &str, score: f32) -> ScoredNode {
    ScoredNode::new(
        Node {
            id: id.to_string(),
            text: text.to_string(),
            metadata: serde_json::Map::new(),
            ref_doc_id: None,
        },
        score,
    )
}

fn chat_client(base_url: String) -> ChatCompletionClient {
    ChatCompletionClient::new(ChatCompletionConfig {
        provider: "groq".to_string(),
        base_url,
        api_key: "groq-key".to_string(),
        model: "mixtral-8x7b-32768".to_string(),
        temperature: 0.1,
        max_tokens: None,
        timeout: TIMEOUT,
    })
    .unwrap()
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for delta in deltas {
        let chunk = json!({ "choices": [{ "index": 0, "delta": { "content": delta } }] });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn test_gemini_embed_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/embedding-001:embedContent"))
        .and(query_param("key", "gemini-key"))
        .and(body_partial_json(json!({
            "model": "models/embedding-001",
            "taskType": "RETRIEVAL_QUERY",
            "content": { "parts": [{ "text": "capital of France" }] },
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        GeminiEmbedding::new("embedding-001", "gemini-key", Some(&server.uri()), TIMEOUT).unwrap();
    assert_eq!(embedder.model_name(), "models/embedding-001");

    let vector = embedder.embed("capital of France").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_gemini_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let embedder =
        GeminiEmbedding::new("models/embedding-001", "bad", Some(&server.uri()), TIMEOUT).unwrap();
    let err = embedder.embed("hello").await.unwrap_err();

    match err {
        EmbeddingError::Api { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("not valid"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_completion_streams_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer groq-key"))
        .and(body_partial_json(json!({
            "model": "mixtral-8x7b-32768",
            "stream": true,
            "messages": [{ "role": "user", "content": "prompt text" }],
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Paris", " is", " the", " capital."]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = chat_client(server.uri());
    let mut stream = client
        .generate("prompt text", CancellationToken::new())
        .await
        .unwrap();

    let mut tokens = Vec::new();
    while let Some(token) = stream.next().await {
        tokens.push(token.unwrap());
    }
    assert_eq!(tokens, vec!["Paris", " is", " the", " capital."]);
}

#[tokio::test]
async fn test_chat_completion_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = chat_client(server.uri());
    let err = client
        .generate("prompt", CancellationToken::new())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, LlmError::Api { status: 429, .. }));
}

#[tokio::test]
async fn test_chat_completion_cancelled_before_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["late"]), "text/event-stream")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = chat_client(server.uri());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client.generate("prompt", cancel).await.err().unwrap();
    assert!(matches!(err, LlmError::Cancelled));
}

#[tokio::test]
async fn test_cohere_rerank_keeps_top_n() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/rerank"))
        .and(header("authorization", "Bearer cohere-key"))
        .and(body_partial_json(json!({
            "model": "rerank-english-v2.0",
            "query": "capital of France",
            "top_n": 2,
            "documents": ["Berlin text", "Tea text", "Paris text"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "results": [
                { "index": 2, "relevance_score": 0.98 },
                { "index": 0, "relevance_score": 0.41 },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reranker = CohereRerank::new(
        "rerank-english-v2.0",
        "cohere-key",
        2,
        Some(&server.uri()),
        TIMEOUT,
    )
    .unwrap();

    let kept = reranker
        .rerank(
            "capital of France",
            vec![
                candidate("berlin", "Berlin text", 0.9),
                candidate("tea", "Tea text", 0.8),
                candidate("paris", "Paris text", 0.7),
            ],
        )
        .await
        .unwrap();

    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].node.id, "paris");
    assert!((kept[0].score - 0.98).abs() < 1e-6);
    assert_eq!(kept[1].node.id, "berlin");
}

#[tokio::test]
async fn test_cohere_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let reranker =
        CohereRerank::new("rerank-english-v2.0", "k", 2, Some(&server.uri()), TIMEOUT).unwrap();
    let err = reranker
        .rerank("query", vec![candidate("a", "text", 0.5)])
        .await
        .unwrap_err();

    assert!(matches!(err, RerankError::Api { status: 500, .. }));
}
