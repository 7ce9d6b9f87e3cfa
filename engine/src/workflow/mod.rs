//! Adaptive answer workflow
//!
//! A run moves a [`RunState`] through routing, retrieval, relevance grading,
//! optional web search, generation and two-phase validation. Every stage
//! reports its progress through the run's [`EventEmitter`].
//!
//! # Limits
//!
//! - At most 3 generation attempts and 2 web-search attempts per run
//! - At most 16 stage visits per run
//! - Every collaborator call runs under the configured timeout

pub mod engine;
pub mod stages;
pub mod state;
pub mod validator;

pub use engine::{RunOutcome, RunReport, Transition, WorkflowEngine, WorkflowStep};
pub use state::{RetryBudget, RunState};
pub use validator::GroundednessVerdict;

use crate::config::WorkflowConfig;
use crate::events::EventEmitter;
use sdk::collaborators::{JudgmentOracle, Retriever, WebSearch};
use sdk::errors::EngineError;
use sdk::events::StepType;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The external capabilities a run depends on
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn JudgmentOracle>,
    pub retriever: Arc<dyn Retriever>,
    /// `None` when web search is not configured
    pub web_search: Option<Arc<dyn WebSearch>>,
}

impl Collaborators {
    pub fn new(
        oracle: Arc<dyn JudgmentOracle>,
        retriever: Arc<dyn Retriever>,
        web_search: Option<Arc<dyn WebSearch>>,
    ) -> Self {
        Self {
            oracle,
            retriever,
            web_search,
        }
    }
}

/// Everything a stage needs besides the run state
pub struct StageContext<'a> {
    pub collaborators: &'a Collaborators,
    pub config: &'a WorkflowConfig,
    pub emitter: &'a EventEmitter,
}

impl StageContext<'_> {
    /// Record a `failed` event for `step` and hand the error back
    pub(crate) async fn fail(
        &self,
        step: StepType,
        error: EngineError,
        start: Instant,
    ) -> EngineError {
        tracing::error!("{} failed: {}", step, error);
        self.emitter
            .failed(step, error.to_string(), start.elapsed())
            .await;
        error
    }
}

/// Await a collaborator call under a deadline
pub(crate) async fn with_timeout<T, F>(
    collaborator: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::CollaboratorTimeout {
            collaborator,
            secs: limit.as_secs(),
        }),
    }
}
