//! Integration tests for the Tavily web search client

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use ragroute_engine::search::TavilySearch;
use sdk::collaborators::WebSearch;
use sdk::errors::EngineError;

#[tokio::test]
async fn test_search_sends_query_and_parses_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-test"))
        .and(body_partial_json(json!({
            "query": "how to make pizza",
            "max_results": 3,
            "search_depth": "basic"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "how to make pizza",
            "results": [
                {"title": "Dough", "url": "https://example.com/dough", "content": "Knead the dough.", "score": 0.9},
                {"title": "Oven", "url": "", "content": "Bake hot.", "score": 0.7}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let search = TavilySearch::new(server.uri(), "tvly-test", 3);
    let results = search.search("how to make pizza").await.unwrap();

    assert_eq!(search.name(), "tavily");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "Knead the dough.");
    assert_eq!(results[0].url.as_deref(), Some("https://example.com/dough"));
    assert!(results[1].url.is_none());
}

#[tokio::test]
async fn test_search_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let search = TavilySearch::new(server.uri(), "wrong", 3);
    let err = search.search("q").await.unwrap_err();
    match err {
        EngineError::WebSearch(msg) => assert!(msg.contains("401")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_search_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let search = TavilySearch::new(server.uri(), "k", 3);
    assert!(matches!(
        search.search("q").await,
        Err(EngineError::WebSearch(_))
    ));
}
