//! Ragroute Engine Library
//!
//! Adaptive retrieval-augmented generation: a question is routed to the
//! local document index or web search, the evidence is graded, and the
//! generated answer is checked for grounding and usefulness before it is
//! returned. Every stage transition is recorded as a process event and
//! streamed to live observers.
//!
//! Used by the `ragroute` binary, the API server and integration tests.

/// Configuration management module
pub mod config;

/// Per-session process event store and emitter
pub mod events;

/// LLM provider abstraction layer
pub mod llm;

/// Judgment oracle backed by LLM providers
pub mod oracle;

/// Local document retrieval
pub mod retrieval;

/// Web search client
pub mod search;

/// Caller-facing chat service
pub mod service;

/// Telemetry and Observability
pub mod telemetry;

/// Adaptive RAG state machine
pub mod workflow;

/// CLI interface module
pub mod cli;

/// Command handlers for CLI operations
pub mod handlers;
