//! Workflow Engine
//!
//! Drives one run through the stage graph:
//!
//! ```text
//! Route     -> Retrieve (vectorstore) | WebSearch (websearch)
//! Retrieve  -> Grade
//! Grade     -> WebSearch (any document irrelevant) | Generate
//! WebSearch -> Generate
//! Generate  -> Exhausted (generation budget spent)
//!            | Generate (not grounded)
//!            | Done (grounded and useful)
//!            | WebSearch (not useful) or Exhausted (web-search budget spent)
//! ```
//!
//! After each generation the retry budget is checked before any grader is
//! consulted; a spent generation budget ends the run without validation.

use std::sync::Arc;
use std::time::Instant;

use sdk::errors::EngineError;
use sdk::types::RouteDecision;
use tracing::{debug, error, info};

use super::stages;
use super::validator::{self, GroundednessVerdict};
use super::{Collaborators, RetryBudget, RunState, StageContext};
use crate::config::WorkflowConfig;
use crate::events::{EventEmitter, SessionEventStore};

/// Maximum number of stage visits per run
pub const MAX_TRANSITIONS: usize = 16;

/// A stage of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Route,
    Retrieve,
    Grade,
    Generate,
    WebSearch,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A grounded, useful answer was produced
    Done,
    /// A retry budget ran out; the last generation is returned as-is
    Exhausted,
}

/// Edge taken after a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(WorkflowStep),
    Finish(RunOutcome),
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub state: RunState,
    /// Stages visited, in order
    pub path: Vec<WorkflowStep>,
}

/// Edge out of `Generate` for a validator verdict
pub fn transition_after_verdict(verdict: GroundednessVerdict, state: &RunState) -> Transition {
    match verdict {
        GroundednessVerdict::NotGrounded if state.generation_budget_spent() => {
            Transition::Finish(RunOutcome::Exhausted)
        }
        GroundednessVerdict::NotGrounded => Transition::Next(WorkflowStep::Generate),
        GroundednessVerdict::Useful => Transition::Finish(RunOutcome::Done),
        GroundednessVerdict::NotUseful if state.web_search_budget_spent() => {
            Transition::Finish(RunOutcome::Exhausted)
        }
        GroundednessVerdict::NotUseful => Transition::Next(WorkflowStep::WebSearch),
    }
}

/// State machine composing the workflow stages
pub struct WorkflowEngine {
    collaborators: Collaborators,
    config: WorkflowConfig,
    store: Arc<SessionEventStore>,
    transition_limit: usize,
}

impl WorkflowEngine {
    pub fn new(
        collaborators: Collaborators,
        config: WorkflowConfig,
        store: Arc<SessionEventStore>,
    ) -> Self {
        Self {
            collaborators,
            config,
            store,
            transition_limit: MAX_TRANSITIONS,
        }
    }

    /// Lower the stage-visit ceiling
    pub fn with_transition_limit(mut self, limit: usize) -> Self {
        self.transition_limit = limit.min(MAX_TRANSITIONS);
        self
    }

    /// Answer one question
    ///
    /// Events are recorded under `session_id`. Queued live deliveries reach
    /// the store before this returns, whether the run succeeded or not.
    pub async fn run(&self, session_id: &str, question: &str) -> Result<RunReport, EngineError> {
        let start = Instant::now();
        info!("Starting run for session {}", session_id);

        let emitter = EventEmitter::spawn(
            Arc::clone(&self.store),
            session_id,
            question,
            self.config.event_queue_capacity,
        );
        let state = RunState::new(session_id, question, RetryBudget::from_config(&self.config));

        let result = self.drive(&emitter, state).await;
        emitter.flush().await;

        match &result {
            Ok(report) => info!(
                "Run for session {} finished {:?} after {} stages in {}ms",
                session_id,
                report.outcome,
                report.path.len(),
                start.elapsed().as_millis()
            ),
            Err(e) => error!("Run for session {} failed: {}", session_id, e),
        }
        result
    }

    async fn drive(
        &self,
        emitter: &EventEmitter,
        mut state: RunState,
    ) -> Result<RunReport, EngineError> {
        let ctx = StageContext {
            collaborators: &self.collaborators,
            config: &self.config,
            emitter,
        };

        let mut step = WorkflowStep::Route;
        let mut path = Vec::new();

        loop {
            if path.len() >= self.transition_limit {
                error!("Run exceeded {} stage visits", self.transition_limit);
                return Err(EngineError::TransitionLimitExceeded(self.transition_limit));
            }
            path.push(step);
            debug!("Entering {:?}", step);

            let transition = self.visit(&ctx, step, &mut state).await?;
            debug!("{:?} -> {:?}", step, transition);

            match transition {
                Transition::Next(next) => step = next,
                Transition::Finish(outcome) => {
                    return Ok(RunReport {
                        outcome,
                        state,
                        path,
                    })
                }
            }
        }
    }

    async fn visit(
        &self,
        ctx: &StageContext<'_>,
        step: WorkflowStep,
        state: &mut RunState,
    ) -> Result<Transition, EngineError> {
        let transition = match step {
            WorkflowStep::Route => {
                let route = stages::route::run(ctx, state).await?;
                match route.decision {
                    RouteDecision::Vectorstore => Transition::Next(WorkflowStep::Retrieve),
                    RouteDecision::Websearch => Transition::Next(WorkflowStep::WebSearch),
                }
            }
            WorkflowStep::Retrieve => {
                stages::retrieve::run(ctx, state).await?;
                Transition::Next(WorkflowStep::Grade)
            }
            WorkflowStep::Grade => {
                stages::grade::run(ctx, state).await?;
                if state.web_search_flag {
                    Transition::Next(WorkflowStep::WebSearch)
                } else {
                    Transition::Next(WorkflowStep::Generate)
                }
            }
            WorkflowStep::WebSearch => {
                stages::web_search::run(ctx, state).await?;
                Transition::Next(WorkflowStep::Generate)
            }
            WorkflowStep::Generate => {
                stages::generate::run(ctx, state).await?;
                if state.generation_budget_spent() {
                    info!(
                        "Generation budget of {} spent, ending run",
                        state.budget().max_generation_attempts
                    );
                    Transition::Finish(RunOutcome::Exhausted)
                } else {
                    let verdict = validator::validate(ctx, state).await?;
                    transition_after_verdict(verdict, state)
                }
            }
        };
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(generations: u32, searches: u32) -> RunState {
        let mut state = RunState::new("s", "q", RetryBudget::default());
        for _ in 0..generations {
            state.record_generation().unwrap();
        }
        for _ in 0..searches {
            state.record_web_search().unwrap();
        }
        state
    }

    #[test]
    fn test_not_grounded_retries_generation() {
        let state = state_with(1, 0);
        assert_eq!(
            transition_after_verdict(GroundednessVerdict::NotGrounded, &state),
            Transition::Next(WorkflowStep::Generate)
        );
    }

    #[test]
    fn test_useful_finishes() {
        let state = state_with(2, 2);
        assert_eq!(
            transition_after_verdict(GroundednessVerdict::Useful, &state),
            Transition::Finish(RunOutcome::Done)
        );
    }

    #[test]
    fn test_not_useful_searches_until_budget_spent() {
        assert_eq!(
            transition_after_verdict(GroundednessVerdict::NotUseful, &state_with(1, 1)),
            Transition::Next(WorkflowStep::WebSearch)
        );
        assert_eq!(
            transition_after_verdict(GroundednessVerdict::NotUseful, &state_with(1, 2)),
            Transition::Finish(RunOutcome::Exhausted)
        );
    }

    #[test]
    fn test_spent_generation_budget_exhausts() {
        assert_eq!(
            transition_after_verdict(GroundednessVerdict::NotGrounded, &state_with(3, 0)),
            Transition::Finish(RunOutcome::Exhausted)
        );
    }
}
