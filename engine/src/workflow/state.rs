//! Run state and retry budgets

use crate::config::{WorkflowConfig, MAX_GENERATION_ATTEMPTS, MAX_WEB_SEARCH_ATTEMPTS};
use sdk::errors::EngineError;
use sdk::types::Document;

/// Attempt ceilings for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_generation_attempts: u32,
    pub max_web_search_attempts: u32,
}

impl RetryBudget {
    /// Budget clamped to at least one attempt and at most the hard ceilings
    ///
    /// Routing can send a run to web search before any budget check, so
    /// neither budget may be zero.
    pub fn new(max_generation_attempts: u32, max_web_search_attempts: u32) -> Self {
        Self {
            max_generation_attempts: max_generation_attempts.clamp(1, MAX_GENERATION_ATTEMPTS),
            max_web_search_attempts: max_web_search_attempts.clamp(1, MAX_WEB_SEARCH_ATTEMPTS),
        }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(
            config.max_generation_attempts,
            config.max_web_search_attempts,
        )
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(MAX_GENERATION_ATTEMPTS, MAX_WEB_SEARCH_ATTEMPTS)
    }
}

/// Mutable state of a single run
///
/// Attempt counters only move forward and only through
/// [`RunState::record_generation`] and [`RunState::record_web_search`].
#[derive(Debug, Clone)]
pub struct RunState {
    pub session_id: String,
    pub question: String,
    pub generation: String,
    pub documents: Vec<Document>,
    pub web_search_flag: bool,
    generation_attempts: u32,
    web_search_attempts: u32,
    budget: RetryBudget,
}

impl RunState {
    pub fn new(
        session_id: impl Into<String>,
        question: impl Into<String>,
        budget: RetryBudget,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            question: question.into(),
            generation: String::new(),
            documents: Vec::new(),
            web_search_flag: false,
            generation_attempts: 0,
            web_search_attempts: 0,
            budget,
        }
    }

    pub fn generation_attempts(&self) -> u32 {
        self.generation_attempts
    }

    pub fn web_search_attempts(&self) -> u32 {
        self.web_search_attempts
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn generation_budget_spent(&self) -> bool {
        self.generation_attempts >= self.budget.max_generation_attempts
    }

    pub fn web_search_budget_spent(&self) -> bool {
        self.web_search_attempts >= self.budget.max_web_search_attempts
    }

    /// Count one generation attempt
    pub fn record_generation(&mut self) -> Result<u32, EngineError> {
        if self.generation_budget_spent() {
            return Err(EngineError::InvalidRunState {
                stage: "generate",
                reason: format!(
                    "generation budget of {} already spent",
                    self.budget.max_generation_attempts
                ),
            });
        }
        self.generation_attempts += 1;
        Ok(self.generation_attempts)
    }

    /// Count one web-search attempt
    pub fn record_web_search(&mut self) -> Result<u32, EngineError> {
        if self.web_search_budget_spent() {
            return Err(EngineError::InvalidRunState {
                stage: "websearch",
                reason: format!(
                    "web-search budget of {} already spent",
                    self.budget.max_web_search_attempts
                ),
            });
        }
        self.web_search_attempts += 1;
        Ok(self.web_search_attempts)
    }

    /// Check the fields every stage relies on
    pub fn validate(&self, stage: &'static str) -> Result<(), EngineError> {
        if self.session_id.trim().is_empty() {
            return Err(EngineError::InvalidRunState {
                stage,
                reason: "session id is empty".to_string(),
            });
        }
        if self.question.trim().is_empty() {
            return Err(EngineError::InvalidRunState {
                stage,
                reason: "question is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Document contents joined in order with `separator`
    pub fn joined_documents(&self, separator: &str) -> String {
        self.documents
            .iter()
            .map(|d| d.content())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_clamped() {
        let budget = RetryBudget::new(10, 10);
        assert_eq!(budget.max_generation_attempts, 3);
        assert_eq!(budget.max_web_search_attempts, 2);

        let budget = RetryBudget::new(0, 0);
        assert_eq!(budget.max_generation_attempts, 1);
        assert_eq!(budget.max_web_search_attempts, 1);
    }

    #[test]
    fn test_generation_counter_stops_at_budget() {
        let mut state = RunState::new("s", "q", RetryBudget::default());
        assert_eq!(state.record_generation().unwrap(), 1);
        assert_eq!(state.record_generation().unwrap(), 2);
        assert_eq!(state.record_generation().unwrap(), 3);
        assert!(state.generation_budget_spent());
        assert!(matches!(
            state.record_generation(),
            Err(EngineError::InvalidRunState { stage: "generate", .. })
        ));
        assert_eq!(state.generation_attempts(), 3);
    }

    #[test]
    fn test_web_search_counter_stops_at_budget() {
        let mut state = RunState::new("s", "q", RetryBudget::default());
        state.record_web_search().unwrap();
        state.record_web_search().unwrap();
        assert!(state.record_web_search().is_err());
        assert_eq!(state.web_search_attempts(), 2);
    }

    #[test]
    fn test_validate_rejects_blank_question() {
        let state = RunState::new("s", "   ", RetryBudget::default());
        assert!(matches!(
            state.validate("retrieve"),
            Err(EngineError::InvalidRunState { stage: "retrieve", .. })
        ));
    }

    #[test]
    fn test_joined_documents_keeps_order() {
        let mut state = RunState::new("s", "q", RetryBudget::default());
        state.documents = vec![Document::new("a"), Document::new("b")];
        assert_eq!(state.joined_documents("\n\n"), "a\n\nb");
    }
}
