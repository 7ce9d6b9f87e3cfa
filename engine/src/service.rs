//! Chat service
//!
//! Caller-facing layer over the workflow engine: runs one question, then
//! shapes the run into the response returned by the CLI and the API server.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Config, WorkflowConfig};
use crate::events::SessionEventStore;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai::OpenAIProvider;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::oracle::LlmOracle;
use crate::retrieval::KeywordRetriever;
use crate::search::TavilySearch;
use crate::workflow::{Collaborators, RunOutcome, RunReport, WorkflowEngine};
use sdk::collaborators::WebSearch;
use sdk::errors::EngineError;
use sdk::types::{preview, Metadata};

/// Session used when the caller does not name one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Preview length for response sources
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Answer given when every retry was spent without a usable generation
pub const FALLBACK_ANSWER: &str = "I'm sorry, I couldn't find a reliable answer to your question. \
Please try rephrasing it or asking something more specific.";

/// Incoming chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A document that contributed to the answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub content_preview: String,
    pub metadata: Metadata,
}

/// Final output of a chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceSummary>,
    pub used_web_search: bool,
    pub session_id: String,
}

impl ChatResponse {
    fn from_report(report: RunReport, session_id: String) -> Self {
        let RunReport { outcome, state, .. } = report;

        let answer = if outcome == RunOutcome::Exhausted && state.generation.trim().is_empty() {
            FALLBACK_ANSWER.to_string()
        } else {
            state.generation.clone()
        };

        let sources = state
            .documents
            .iter()
            .map(|doc| SourceSummary {
                content_preview: preview(doc.content(), SOURCE_PREVIEW_CHARS),
                metadata: doc.metadata().clone(),
            })
            .collect();

        Self {
            answer,
            sources,
            used_web_search: state.web_search_attempts() > 0 || state.web_search_flag,
            session_id,
        }
    }
}

/// Build the provider router described by the `[llm]` section
pub fn build_router(config: &Config) -> LLMRouter {
    let providers: Vec<Box<dyn LLMProvider>> = vec![
        Box::new(OllamaProvider::new(
            &config.llm.ollama.base_url,
            &config.llm.ollama.model,
        )),
        Box::new(OpenAIProvider::new(config.llm.openai.clone())),
    ];
    LLMRouter::new(providers, &config.llm.default_provider).with_timeouts(
        Duration::from_secs(config.llm.local_timeout_secs),
        Duration::from_secs(config.llm.cloud_timeout_secs),
    )
}

/// Build the production collaborators described by `config`
///
/// Without a corpus the retriever is empty, so vectorstore questions fall
/// through to web search after grading.
pub fn build_collaborators(config: &Config) -> Result<Collaborators, EngineError> {
    let oracle = LlmOracle::new(Arc::new(build_router(config)));

    let retriever = match config.corpus_path() {
        Some(path) => KeywordRetriever::from_file(&path, config.retrieval.top_k)?,
        None => {
            tracing::warn!("No retrieval corpus configured; the local index is empty");
            KeywordRetriever::new(Vec::new(), config.retrieval.top_k)
        }
    };

    let web_search =
        TavilySearch::from_config(&config.search).map(|s| Arc::new(s) as Arc<dyn WebSearch>);

    Ok(Collaborators::new(
        Arc::new(oracle),
        Arc::new(retriever),
        web_search,
    ))
}

/// Runs questions through a fresh workflow engine each time
pub struct ChatService {
    collaborators: Collaborators,
    workflow: WorkflowConfig,
    store: Arc<SessionEventStore>,
}

impl ChatService {
    pub fn new(
        collaborators: Collaborators,
        workflow: WorkflowConfig,
        store: Arc<SessionEventStore>,
    ) -> Self {
        Self {
            collaborators,
            workflow,
            store,
        }
    }

    /// Build a service from config and prebuilt collaborators
    pub fn from_config(
        config: &Config,
        collaborators: Collaborators,
        store: Arc<SessionEventStore>,
    ) -> Self {
        Self::new(collaborators, config.workflow.clone(), store)
    }

    pub fn event_store(&self) -> Arc<SessionEventStore> {
        Arc::clone(&self.store)
    }

    /// Answer a question
    pub async fn ask(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<ChatResponse, EngineError> {
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID)
            .to_string();

        let engine = WorkflowEngine::new(
            self.collaborators.clone(),
            self.workflow.clone(),
            Arc::clone(&self.store),
        );
        let report = engine.run(&session_id, question.trim()).await?;

        Ok(ChatResponse::from_report(report, session_id))
    }

    /// Answer a deserialized request
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatResponse, EngineError> {
        self.ask(&request.question, request.session_id.as_deref())
            .await
    }
}
