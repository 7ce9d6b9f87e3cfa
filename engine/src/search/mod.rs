//! Tavily web search
//!
//! Implements the `WebSearch` collaborator against the Tavily search API.
//! The API key is read from the environment variable named in the
//! `[search]` config section; without it no client is built and the
//! workflow's web-search stage falls back to its explanatory document.

use async_trait::async_trait;
use reqwest::Client;
use sdk::collaborators::WebSearch;
use sdk::errors::EngineError;
use sdk::types::SearchResult;
use serde::Deserialize;
use serde_json::json;

use crate::config::SearchConfig;

/// Tavily search client
#[derive(Debug, Clone)]
pub struct TavilySearch {
    base_url: String,
    api_key: String,
    max_results: u32,
    client: Client,
}

impl TavilySearch {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, max_results: u32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results,
            client: Client::new(),
        }
    }

    /// Build a client from config, or `None` when search is disabled or no key is set
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        if !config.enabled {
            tracing::info!("Web search disabled in config");
            return None;
        }
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                Some(Self::new(&config.base_url, key, config.max_results))
            }
            _ => {
                tracing::warn!(
                    "{} is not set; web search will use fallback answers",
                    config.api_key_env
                );
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, EngineError> {
        let body = json!({
            "query": query,
            "search_depth": "basic",
            "max_results": self.max_results,
            "include_answer": false,
            "include_raw_content": false
        });

        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::WebSearch(format!("tavily request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::WebSearch(format!(
                "tavily status {}: {}",
                status, text
            )));
        }

        let payload: TavilyResponse = response
            .json()
            .await
            .map_err(|e| EngineError::WebSearch(format!("tavily response parse: {}", e)))?;

        tracing::debug!("Tavily returned {} results", payload.results.len());

        Ok(payload
            .results
            .into_iter()
            .map(|r| SearchResult {
                content: r.content,
                url: r.url.filter(|u| !u.trim().is_empty()),
            })
            .collect())
    }
}
