//! Error types and handling
//!
//! This module provides the error types used throughout the Ragroute engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Hints returned by `user_hint()` are static strings. They never echo
//! collaborator output, prompts, or API keys back to the caller.

use thiserror::Error;

/// Trait for Ragroute error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets, document contents, or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller (a new run with the
    /// same question may succeed). Non-recoverable errors need operator action.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Collaborators**: Oracle, retriever and web-search failures or timeouts
/// - **Run state**: A stage received a run state missing a required field
/// - **Control flow**: The transition ceiling was reached
/// - **Event feed**: Serialization of feed messages
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::Oracle("connection refused".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("bad log level".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Collaborator errors
    #[error("Judgment oracle error: {0}")]
    Oracle(String),

    #[error("Retriever error: {0}")]
    Retriever(String),

    #[error("Web search error: {0}")]
    WebSearch(String),

    #[error("Web search is not configured")]
    WebSearchUnavailable,

    #[error("{collaborator} call timed out after {secs}s")]
    CollaboratorTimeout {
        collaborator: &'static str,
        secs: u64,
    },

    // Run state errors
    #[error("Invalid run state at {stage}: {reason}")]
    InvalidRunState { stage: &'static str, reason: String },

    // Control flow errors
    #[error("Transition limit exceeded after {0} stage visits")]
    TransitionLimitExceeded(usize),

    // Event feed errors
    #[error("Event serialization failed: {0}")]
    EventSerialization(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            // Configuration errors
            Self::Config(_) => "Check your config.toml file for errors",

            // Collaborator errors
            Self::Oracle(_) => "Language model unavailable. Check provider settings and network",
            Self::Retriever(_) => "Document index unavailable. Try again later",
            Self::WebSearch(_) => "Web search failed. Try again later",
            Self::WebSearchUnavailable => "Web search is not configured. Set the search API key",
            Self::CollaboratorTimeout { .. } => "An upstream service took too long. Try again",

            // Run state errors
            Self::InvalidRunState { .. } => "The request was malformed. Ask a non-empty question",

            // Control flow errors
            Self::TransitionLimitExceeded(_) => "Question could not be resolved. Try rephrasing",

            // Event feed errors
            Self::EventSerialization(_) => "Process event could not be delivered",

            // Network errors
            Self::Network(_) => "Network operation failed. Check your connection",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_) | Self::TransitionLimitExceeded(_) | Self::InvalidRunState { .. } => {
                false
            }

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}
