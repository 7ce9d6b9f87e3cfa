//! Keyword retriever
//!
//! In-memory `Retriever` over a JSON corpus. Documents are ranked by how
//! many distinct question terms they contain; ties keep corpus order.
//!
//! The corpus file is a JSON array of `{"content": ..., "metadata": {...}}`
//! objects.

use async_trait::async_trait;
use regex::Regex;
use sdk::collaborators::Retriever;
use sdk::errors::EngineError;
use sdk::types::Document;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// Words too common to say anything about relevance
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "of", "on", "or", "the", "to", "what", "when", "where", "which", "who",
    "why", "with",
];

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("Invalid term pattern"))
}

fn terms(text: &str) -> HashSet<String> {
    term_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

struct IndexedDocument {
    document: Document,
    terms: HashSet<String>,
}

/// Keyword-overlap retriever over an in-memory corpus
pub struct KeywordRetriever {
    corpus: Vec<IndexedDocument>,
    top_k: usize,
}

impl KeywordRetriever {
    pub fn new(documents: Vec<Document>, top_k: usize) -> Self {
        let corpus = documents
            .into_iter()
            .map(|document| IndexedDocument {
                terms: terms(document.content()),
                document,
            })
            .collect();
        Self {
            corpus,
            top_k: top_k.max(1),
        }
    }

    /// Load a corpus from a JSON file
    pub fn from_file(path: &Path, top_k: usize) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Retriever(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let documents: Vec<Document> = serde_json::from_str(&contents).map_err(|e| {
            EngineError::Retriever(format!("Failed to parse corpus {}: {}", path.display(), e))
        })?;
        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            path.display()
        );
        Ok(Self::new(documents, top_k))
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<Document>, EngineError> {
        let query = terms(question);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize)> = self
            .corpus
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, doc.terms.intersection(&query).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(i, _)| self.corpus[i].document.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever() -> KeywordRetriever {
        KeywordRetriever::new(
            vec![
                Document::new("Agents use memory and planning."),
                Document::new("Prompt engineering guides model output."),
                Document::new("Agent memory: short-term and long-term memory."),
                Document::new("Pizza dough needs flour."),
            ],
            2,
        )
    }

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let docs = retriever().retrieve("What is agent memory?").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].content().starts_with("Agent memory"));
        assert!(docs[1].content().starts_with("Agents use"));
    }

    #[tokio::test]
    async fn test_respects_top_k_and_order() {
        let docs = retriever()
            .retrieve("memory planning prompt")
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].content().starts_with("Agents use"));
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let docs = retriever().retrieve("quantum chromodynamics").await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_stop_words_only() {
        let docs = retriever().retrieve("what is the").await.unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = KeywordRetriever::from_file(Path::new("/nonexistent/corpus.json"), 4)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Retriever(_)));
    }
}
