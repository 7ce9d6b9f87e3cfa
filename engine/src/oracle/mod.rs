//! LLM-backed judgment oracle
//!
//! Implements `JudgmentOracle` on top of the [`LLMRouter`]. Grading prompts
//! ask the model for a small JSON object; replies are parsed tolerantly
//! because local models often wrap JSON in prose or code fences, and
//! sometimes answer with a bare "yes" or "no".

use async_trait::async_trait;
use regex::Regex;
use sdk::collaborators::JudgmentOracle;
use sdk::errors::EngineError;
use sdk::types::{BinaryScore, RouteClassification, RouteDecision};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::llm::router::LLMRouter;
use crate::llm::{extract_json_object, Message};

const ROUTER_PROMPT: &str = "You route user questions to a datasource. \
The vectorstore holds documents about AI agents, prompt engineering, adversarial attacks on LLMs and general machine learning. \
Choose \"vectorstore\" for questions on those topics and \"websearch\" for anything else (news, weather, recipes, other subjects). \
Reply with JSON only: {\"datasource\": \"vectorstore\" | \"websearch\", \"confidence\": <0.0-1.0>, \"reasoning\": \"<one sentence>\"}";

const DOCUMENT_GRADER_PROMPT: &str = "You grade whether a retrieved document is relevant to a user question. \
A document is relevant if it shares keywords or meaning with the question. \
Reply with JSON only: {\"binary_score\": \"yes\"} or {\"binary_score\": \"no\"}";

const HALLUCINATION_GRADER_PROMPT: &str = "You grade whether an answer is supported by a set of facts. \
\"yes\" means every claim in the answer is grounded in the facts. \
Reply with JSON only: {\"binary_score\": \"yes\"} or {\"binary_score\": \"no\"}";

const ANSWER_GRADER_PROMPT: &str = "You grade whether an answer resolves a question. \
\"yes\" means the answer addresses the question. \
Reply with JSON only: {\"binary_score\": \"yes\"} or {\"binary_score\": \"no\"}";

const GENERATION_PROMPT: &str = "You answer questions using the context documents below.\n\
- Give the actual information from the context, not a pointer to where it is\n\
- Be specific: list techniques, methods and examples the context mentions\n\
- If the context does not answer the question, say so plainly\n\n\
Context documents:\n";

fn bare_verdict() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(yes|no)\b").expect("Invalid verdict pattern"))
}

/// Judgment oracle backed by chat-completion providers
pub struct LlmOracle {
    router: Arc<LLMRouter>,
}

impl LlmOracle {
    pub fn new(router: Arc<LLMRouter>) -> Self {
        Self { router }
    }

    async fn ask(&self, system: &str, user: String) -> Result<String, EngineError> {
        let messages = [Message::system(system), Message::user(user)];
        let (reply, provider) = self.router.call(&messages).await?;
        tracing::debug!("Oracle reply from {} ({} chars)", provider, reply.len());
        Ok(reply)
    }

    async fn ask_binary(&self, system: &str, user: String) -> Result<BinaryScore, EngineError> {
        let reply = self.ask(system, user).await?;
        parse_binary_score(&reply)
            .ok_or_else(|| EngineError::Oracle(format!("Unparseable grade: {}", snippet(&reply))))
    }
}

fn snippet(reply: &str) -> String {
    sdk::types::preview(reply.trim(), 80)
}

/// Read a yes/no grade from a model reply
pub fn parse_binary_score(reply: &str) -> Option<BinaryScore> {
    if let Some(value) = extract_json_object(reply) {
        match value.get("binary_score").or_else(|| value.get("score")) {
            Some(Value::Bool(b)) => return Some(BinaryScore::from(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => return Some(BinaryScore::Yes),
                "no" | "false" => return Some(BinaryScore::No),
                _ => {}
            },
            _ => {}
        }
    }

    bare_verdict()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| BinaryScore::from(m.as_str().eq_ignore_ascii_case("yes")))
}

fn parse_datasource(raw: &str) -> Option<RouteDecision> {
    let normalized: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "vectorstore" => Some(RouteDecision::Vectorstore),
        "websearch" => Some(RouteDecision::Websearch),
        _ => None,
    }
}

/// Read a routing decision from a model reply
pub fn parse_route(reply: &str) -> Option<RouteClassification> {
    if let Some(value) = extract_json_object(reply) {
        if let Some(decision) = value
            .get("datasource")
            .and_then(Value::as_str)
            .and_then(parse_datasource)
        {
            return Some(RouteClassification {
                decision,
                confidence: value
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .map(|c| c.clamp(0.0, 1.0)),
                reasoning: value
                    .get("reasoning")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }

    let lower = reply.to_ascii_lowercase();
    let web = lower.find("websearch").or_else(|| lower.find("web search"));
    let vector = lower.find("vectorstore").or_else(|| lower.find("vector store"));
    let decision = match (web, vector) {
        (Some(w), Some(v)) if v < w => RouteDecision::Vectorstore,
        (Some(_), _) => RouteDecision::Websearch,
        (None, Some(_)) => RouteDecision::Vectorstore,
        (None, None) => return None,
    };
    Some(RouteClassification::new(decision))
}

#[async_trait]
impl JudgmentOracle for LlmOracle {
    async fn classify_route(&self, question: &str) -> Result<RouteClassification, EngineError> {
        let reply = self.ask(ROUTER_PROMPT, question.to_string()).await?;
        parse_route(&reply)
            .ok_or_else(|| EngineError::Oracle(format!("Unparseable route: {}", snippet(&reply))))
    }

    async fn grade_document(
        &self,
        question: &str,
        document: &str,
    ) -> Result<BinaryScore, EngineError> {
        self.ask_binary(
            DOCUMENT_GRADER_PROMPT,
            format!(
                "Retrieved document:\n\n{}\n\nUser question: {}",
                document, question
            ),
        )
        .await
    }

    async fn grade_hallucination(
        &self,
        facts: &str,
        generation: &str,
    ) -> Result<bool, EngineError> {
        let score = self
            .ask_binary(
                HALLUCINATION_GRADER_PROMPT,
                format!("Set of facts:\n\n{}\n\nAnswer: {}", facts, generation),
            )
            .await?;
        Ok(score.is_yes())
    }

    async fn grade_answer_relevance(
        &self,
        question: &str,
        generation: &str,
    ) -> Result<bool, EngineError> {
        let score = self
            .ask_binary(
                ANSWER_GRADER_PROMPT,
                format!("User question:\n\n{}\n\nAnswer: {}", question, generation),
            )
            .await?;
        Ok(score.is_yes())
    }

    async fn generate(&self, context: &str, question: &str) -> Result<String, EngineError> {
        let system = format!("{}{}", GENERATION_PROMPT, context);
        let reply = self.ask(&system, format!("Question: {}", question)).await?;
        Ok(reply.trim().to_string())
    }
}
