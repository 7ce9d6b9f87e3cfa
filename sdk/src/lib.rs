//! Ragroute SDK
//!
//! Shared library providing the collaborator traits, document and event types,
//! and the error type used by the engine, the API server and test doubles.

/// Collaborator traits (oracle, retriever, web search)
pub mod collaborators;

/// Error types and handling
pub mod errors;

/// Process event types
pub mod events;

/// Document and judgment types
pub mod types;

// Re-export commonly used types
pub use collaborators::{JudgmentOracle, Retriever, WebSearch};
pub use errors::{EngineError, ErrorExt};
pub use events::{
    DocumentGrade, EventPayload, FeedControl, FeedRequest, ProcessEvent, StepStatus, StepType,
};
pub use types::{
    preview, BinaryScore, Document, Metadata, RouteClassification, RouteDecision, SearchResult,
};
