//! Integration tests for the LLM Router and the oracle built on it
//!
//! Validates provider failover and reply parsing using mock servers

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use ragroute_engine::config::OpenAIConfig;
use ragroute_engine::llm::{
    ollama::OllamaProvider, openai::OpenAIProvider, router::LLMRouter, LLMError, LLMProvider,
    Message,
};
use ragroute_engine::oracle::LlmOracle;
use sdk::collaborators::JudgmentOracle;
use sdk::types::{BinaryScore, RouteDecision};

fn ollama_reply(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.2:3b",
        "created_at": "2024-08-04T19:22:45.499127Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": true
    })
}

async fn ollama_server(content: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(content)))
        .mount(&server)
        .await;
    server
}

fn ollama(server: &MockServer) -> Box<dyn LLMProvider> {
    Box::new(OllamaProvider::new(server.uri(), "llama3.2:3b"))
}

#[tokio::test]
async fn test_llm_router_failover_with_wiremock() {
    let failing_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing_server)
        .await;

    let succeeding_server = ollama_server("Hello! I am the backup provider.").await;

    // Equal rank: the router keeps registration order
    let router = LLMRouter::new(
        vec![ollama(&failing_server), ollama(&succeeding_server)],
        "ollama",
    );

    let (reply, provider) = router.call(&[Message::user("Hello")]).await.unwrap();
    assert_eq!(reply, "Hello! I am the backup provider.");
    assert_eq!(provider, "ollama");
}

#[tokio::test]
async fn test_llm_router_all_failing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let router = LLMRouter::new(vec![ollama(&server)], "ollama");
    let err = router.call(&[Message::user("Hello")]).await.unwrap_err();
    assert!(matches!(err, LLMError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn test_ollama_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2:3b",
            "stream": false,
            "messages": [
                {"role": "system", "content": "grade"},
                {"role": "user", "content": "q"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.2:3b");
    let reply = provider
        .generate(&[Message::system("grade"), Message::user("q")])
        .await
        .unwrap();
    assert_eq!(reply, "ok");
}

#[tokio::test]
async fn test_openai_provider_with_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"binary_score\": \"no\"}"}}]
        })))
        .mount(&server)
        .await;

    std::env::set_var("RAGROUTE_TEST_OPENAI_KEY", "test-key");
    let provider = OpenAIProvider::new(OpenAIConfig {
        base_url: server.uri(),
        model: "gpt-4o-mini".to_string(),
        api_key_env: "RAGROUTE_TEST_OPENAI_KEY".to_string(),
    });

    let reply = provider.generate(&[Message::user("q")]).await.unwrap();
    assert_eq!(reply, "{\"binary_score\": \"no\"}");
}

#[tokio::test]
async fn test_openai_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    std::env::set_var("RAGROUTE_TEST_OPENAI_KEY_429", "test-key");
    let provider = OpenAIProvider::new(OpenAIConfig {
        base_url: server.uri(),
        model: "gpt-4o-mini".to_string(),
        api_key_env: "RAGROUTE_TEST_OPENAI_KEY_429".to_string(),
    });

    let err = provider.generate(&[Message::user("q")]).await.unwrap_err();
    assert!(matches!(err, LLMError::RateLimitExceeded));
}

#[tokio::test]
async fn test_oracle_routes_from_fenced_json() {
    let server = ollama_server(
        "```json\n{\"datasource\": \"websearch\", \"confidence\": 0.8, \"reasoning\": \"cooking\"}\n```",
    )
    .await;
    let oracle = LlmOracle::new(Arc::new(LLMRouter::new(vec![ollama(&server)], "ollama")));

    let route = oracle.classify_route("how to make pizza").await.unwrap();
    assert_eq!(route.decision, RouteDecision::Websearch);
    assert_eq!(route.confidence, Some(0.8));
}

#[tokio::test]
async fn test_oracle_grades_from_prose() {
    let server = ollama_server("After review: {\"binary_score\": \"yes\"}").await;
    let oracle = LlmOracle::new(Arc::new(LLMRouter::new(vec![ollama(&server)], "ollama")));

    let grade = oracle
        .grade_document("agent memory", "Agents have memory.")
        .await
        .unwrap();
    assert_eq!(grade, BinaryScore::Yes);
    assert!(oracle.grade_hallucination("facts", "answer").await.unwrap());
}

#[tokio::test]
async fn test_oracle_unparseable_grade_is_an_error() {
    let server = ollama_server("I cannot decide.").await;
    let oracle = LlmOracle::new(Arc::new(LLMRouter::new(vec![ollama(&server)], "ollama")));

    let err = oracle
        .grade_answer_relevance("q", "a")
        .await
        .unwrap_err();
    assert!(matches!(err, sdk::errors::EngineError::Oracle(_)));
}

#[tokio::test]
async fn test_oracle_generation_is_trimmed() {
    let server = ollama_server("\n  Agents remember things.  \n").await;
    let oracle = LlmOracle::new(Arc::new(LLMRouter::new(vec![ollama(&server)], "ollama")));

    let answer = oracle.generate("ctx", "q").await.unwrap();
    assert_eq!(answer, "Agents remember things.");
}
