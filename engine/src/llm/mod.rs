//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the chat-completion backends
//! (Ollama, OpenAI-compatible) that power the judgment oracle. The LLMProvider
//! trait defines the contract every backend implements, so the router can fail
//! over between them transparently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openai;
pub mod router;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for sdk::errors::EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::NetworkError(msg) => sdk::errors::EngineError::Network(msg),
            other => sdk::errors::EngineError::Oracle(other.to_string()),
        }
    }
}

/// Message in a prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for cloud providers
    fn is_local(&self) -> bool;

    /// Complete a prompt and return the raw assistant text
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Pull the first JSON object out of a model reply.
///
/// Handles the output shapes small models actually produce:
/// 1. Raw JSON: `{"binary_score": "yes"}`
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. JSON embedded in prose: scans for the first balanced `{...}`
pub fn extract_json_object(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();

    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(value) = parse_object(inner.trim()) {
            return Some(value);
        }
    }

    let mut rest = trimmed;
    while let Some(pos) = rest.find('{') {
        let candidate = &rest[pos..];
        if let Some(json_str) = extract_balanced_json(candidate) {
            if let Some(value) = parse_object(json_str) {
                return Some(value);
            }
        }
        rest = &candidate[1..];
    }

    None
}

fn parse_object(s: &str) -> Option<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(s).ok()?;
    value.is_object().then_some(value)
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
