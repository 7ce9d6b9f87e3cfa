//! Collaborator traits
//!
//! The workflow engine talks to the outside world only through these traits.
//! Implementations live in the engine crate (LLM-backed oracle, Tavily search,
//! keyword retriever) or in tests (scripted doubles).

use crate::errors::EngineError;
use crate::types::{BinaryScore, Document, RouteClassification, SearchResult};
use async_trait::async_trait;

/// Classification and generation capability consulted by every stage
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    /// Decide whether a question belongs to the local index or the web
    async fn classify_route(&self, question: &str) -> Result<RouteClassification, EngineError>;

    /// Grade whether a document is relevant to a question
    async fn grade_document(
        &self,
        question: &str,
        document: &str,
    ) -> Result<BinaryScore, EngineError>;

    /// Whether `generation` is supported by `facts`
    async fn grade_hallucination(
        &self,
        facts: &str,
        generation: &str,
    ) -> Result<bool, EngineError>;

    /// Whether `generation` addresses `question`
    async fn grade_answer_relevance(
        &self,
        question: &str,
        generation: &str,
    ) -> Result<bool, EngineError>;

    /// Draft an answer to `question` from `context`
    async fn generate(&self, context: &str, question: &str) -> Result<String, EngineError>;
}

/// Local document index
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return documents for a question, most relevant first
    async fn retrieve(&self, question: &str) -> Result<Vec<Document>, EngineError>;
}

/// Live web search
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Returns the name of the provider (e.g., "tavily")
    fn name(&self) -> &str;

    /// Search the web, best hit first
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, EngineError>;
}
