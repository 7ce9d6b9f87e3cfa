//! Document and judgment types shared by the engine and its collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key/value metadata attached to a document by its producer
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A unit of context text produced by a retriever or the web-search stage
///
/// Documents are immutable once produced; stages replace or append whole
/// documents, they never edit one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    content: String,
    #[serde(default)]
    metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a document with the given metadata
    pub fn with_metadata(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Document text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Producer metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// True when the content is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// The `source` metadata entry, or "Unknown"
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
    }
}

/// One hit returned by a web-search collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result snippet
    pub content: String,

    /// Origin URL, when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SearchResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            url: None,
        }
    }
}

/// Datasource chosen for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    /// Local document index
    Vectorstore,
    /// Live web search
    #[serde(alias = "web_search")]
    Websearch,
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDecision::Vectorstore => write!(f, "vectorstore"),
            RouteDecision::Websearch => write!(f, "websearch"),
        }
    }
}

/// Routing answer from the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteClassification {
    pub decision: RouteDecision,

    /// Oracle-reported confidence in 0.0..=1.0
    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub reasoning: Option<String>,
}

impl RouteClassification {
    pub fn new(decision: RouteDecision) -> Self {
        Self {
            decision,
            confidence: None,
            reasoning: None,
        }
    }
}

/// Binary yes/no judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryScore {
    Yes,
    No,
}

impl BinaryScore {
    pub fn is_yes(self) -> bool {
        matches!(self, BinaryScore::Yes)
    }
}

impl From<bool> for BinaryScore {
    fn from(value: bool) -> Self {
        if value {
            BinaryScore::Yes
        } else {
            BinaryScore::No
        }
    }
}

impl fmt::Display for BinaryScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryScore::Yes => write!(f, "yes"),
            BinaryScore::No => write!(f, "no"),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, appending "..." when cut
///
/// Cuts on a char boundary, so multi-byte text never panics.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
