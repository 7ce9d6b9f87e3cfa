//! Process events
//!
//! A `ProcessEvent` records one stage transition of a workflow run. Events are
//! immutable once built and serialize to the JSON records the event feed
//! streams to observers.

use crate::types::{BinaryScore, RouteDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preview length for graded documents
pub const DOCUMENT_PREVIEW_CHARS: usize = 150;

/// Preview length for generated answers
pub const GENERATION_PREVIEW_CHARS: usize = 200;

/// Workflow step an event belongs to
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Routing,
    Retrieve,
    GradeDocuments,
    Generate,
    Websearch,
    HallucinationCheck,
    AnswerGrading,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepType::Routing => "routing",
            StepType::Retrieve => "retrieve",
            StepType::GradeDocuments => "grade_documents",
            StepType::Generate => "generate",
            StepType::Websearch => "websearch",
            StepType::HallucinationCheck => "hallucination_check",
            StepType::AnswerGrading => "answer_grading",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a step
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
}

/// Per-document grading summary carried by a grading event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentGrade {
    pub content_preview: String,
    pub grade: BinaryScore,
    pub source: String,
}

/// Step-specific event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Started {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempt: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    Routing {
        decision: RouteDecision,
        confidence: Option<f64>,
        reasoning: Option<String>,
    },
    Retrieved {
        documents_found: usize,
    },
    Graded {
        documents_graded: Vec<DocumentGrade>,
        relevant_documents: usize,
    },
    WebSearched {
        query: String,
        sources_found: usize,
        fallback: bool,
    },
    Generated {
        attempt: u32,
        generation_preview: String,
    },
    Hallucination {
        grounded: bool,
        score: BinaryScore,
    },
    AnswerGrade {
        useful: bool,
        score: BinaryScore,
    },
    Failed {
        error_message: String,
    },
}

/// A single recorded workflow transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub session_id: String,
    pub event_id: String,
    pub step_type: StepType,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub payload: EventPayload,
}

impl ProcessEvent {
    /// Build an event with a fresh id and the current time
    pub fn new(
        session_id: impl Into<String>,
        step_type: StepType,
        status: StepStatus,
        question: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            event_id: format!("event-{}", uuid::Uuid::new_v4()),
            step_type,
            status,
            timestamp: Utc::now(),
            question: question.into(),
            duration_ms: None,
            payload,
        }
    }

    /// Attach an elapsed duration
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn started(session_id: &str, step_type: StepType, question: &str) -> Self {
        Self::new(
            session_id,
            step_type,
            StepStatus::Started,
            question,
            EventPayload::Started {
                attempt: None,
                query: None,
            },
        )
    }

    pub fn failed(
        session_id: &str,
        step_type: StepType,
        question: &str,
        error_message: impl Into<String>,
    ) -> Self {
        Self::new(
            session_id,
            step_type,
            StepStatus::Failed,
            question,
            EventPayload::Failed {
                error_message: error_message.into(),
            },
        )
    }

    pub fn completed(
        session_id: &str,
        step_type: StepType,
        question: &str,
        payload: EventPayload,
    ) -> Self {
        Self::new(session_id, step_type, StepStatus::Completed, question, payload)
    }

    /// Short label such as `routing-started`, handy in logs and assertions
    pub fn label(&self) -> String {
        let status = match self.status {
            StepStatus::Started => "started",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        };
        format!("{}-{}", self.step_type, status)
    }
}

/// Messages written to an event-feed observer
///
/// Plain events are written as bare `ProcessEvent` records; control messages
/// carry a `type` tag so clients can tell them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedControl {
    /// Heartbeat reply
    Pong,
    /// Full backlog, answered to `get_events`
    SessionEvents { events: Vec<ProcessEvent> },
}

/// Requests an event-feed observer may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedRequest {
    Ping,
    GetEvents,
}
