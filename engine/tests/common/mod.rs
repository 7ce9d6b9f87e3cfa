//! Scripted collaborators shared by the integration tests
//!
//! Each double answers from a queue and counts its calls. An exhausted
//! queue falls back to the "happy" answer.

#![allow(dead_code)]

use async_trait::async_trait;
use ragroute_engine::config::WorkflowConfig;
use ragroute_engine::events::SessionEventStore;
use ragroute_engine::workflow::{Collaborators, WorkflowEngine};
use sdk::collaborators::{JudgmentOracle, Retriever, WebSearch};
use sdk::errors::EngineError;
use sdk::types::{BinaryScore, Document, RouteClassification, RouteDecision, SearchResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Calls {
    pub route: AtomicUsize,
    pub grade_document: AtomicUsize,
    pub hallucination: AtomicUsize,
    pub relevance: AtomicUsize,
    pub generate: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Oracle answering from per-method scripts
pub struct ScriptedOracle {
    pub route: RouteDecision,
    pub document_grades: Mutex<VecDeque<BinaryScore>>,
    pub grounded: Mutex<VecDeque<bool>>,
    pub useful: Mutex<VecDeque<bool>>,
    pub generations: Mutex<VecDeque<String>>,
    /// Method name that returns an error
    pub fail_on: Option<&'static str>,
    /// Method name that never returns
    pub hang_on: Option<&'static str>,
    pub calls: Calls,
    /// Contexts passed to `generate`, in call order
    pub contexts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(route: RouteDecision) -> Self {
        Self {
            route,
            document_grades: Mutex::new(VecDeque::new()),
            grounded: Mutex::new(VecDeque::new()),
            useful: Mutex::new(VecDeque::new()),
            generations: Mutex::new(VecDeque::new()),
            fail_on: None,
            hang_on: None,
            calls: Calls::default(),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn grades(self, grades: &[BinaryScore]) -> Self {
        self.document_grades.lock().unwrap().extend(grades);
        self
    }

    pub fn grounded(self, verdicts: &[bool]) -> Self {
        self.grounded.lock().unwrap().extend(verdicts);
        self
    }

    pub fn useful(self, verdicts: &[bool]) -> Self {
        self.useful.lock().unwrap().extend(verdicts);
        self
    }

    pub fn generations(self, answers: &[&str]) -> Self {
        self.generations
            .lock()
            .unwrap()
            .extend(answers.iter().map(|a| a.to_string()));
        self
    }

    pub fn failing_on(mut self, method: &'static str) -> Self {
        self.fail_on = Some(method);
        self
    }

    pub fn hanging_on(mut self, method: &'static str) -> Self {
        self.hang_on = Some(method);
        self
    }

    async fn gate(&self, method: &'static str) -> Result<(), EngineError> {
        if self.hang_on == Some(method) {
            std::future::pending::<()>().await;
        }
        if self.fail_on == Some(method) {
            return Err(EngineError::Oracle(format!("{} unavailable", method)));
        }
        Ok(())
    }
}

#[async_trait]
impl JudgmentOracle for ScriptedOracle {
    async fn classify_route(&self, _question: &str) -> Result<RouteClassification, EngineError> {
        self.calls.route.fetch_add(1, Ordering::SeqCst);
        self.gate("classify_route").await?;
        Ok(RouteClassification {
            decision: self.route,
            confidence: Some(0.9),
            reasoning: Some("scripted".to_string()),
        })
    }

    async fn grade_document(
        &self,
        _question: &str,
        _document: &str,
    ) -> Result<BinaryScore, EngineError> {
        self.calls.grade_document.fetch_add(1, Ordering::SeqCst);
        self.gate("grade_document").await?;
        Ok(self
            .document_grades
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BinaryScore::Yes))
    }

    async fn grade_hallucination(
        &self,
        _facts: &str,
        _generation: &str,
    ) -> Result<bool, EngineError> {
        self.calls.hallucination.fetch_add(1, Ordering::SeqCst);
        self.gate("grade_hallucination").await?;
        Ok(self.grounded.lock().unwrap().pop_front().unwrap_or(true))
    }

    async fn grade_answer_relevance(
        &self,
        _question: &str,
        _generation: &str,
    ) -> Result<bool, EngineError> {
        self.calls.relevance.fetch_add(1, Ordering::SeqCst);
        self.gate("grade_answer_relevance").await?;
        Ok(self.useful.lock().unwrap().pop_front().unwrap_or(true))
    }

    async fn generate(&self, context: &str, _question: &str) -> Result<String, EngineError> {
        let n = self.calls.generate.fetch_add(1, Ordering::SeqCst) + 1;
        self.contexts.lock().unwrap().push(context.to_string());
        self.gate("generate").await?;
        Ok(self
            .generations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("answer {}", n)))
    }
}

/// Retriever returning a fixed document list
pub struct StaticRetriever {
    pub documents: Vec<Document>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(contents: &[&str]) -> Self {
        Self {
            documents: contents.iter().map(|c| Document::new(*c)).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            documents: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _question: &str) -> Result<Vec<Document>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::Retriever("index offline".to_string()));
        }
        Ok(self.documents.clone())
    }
}

/// Web search returning fixed snippets, or failing
pub struct ScriptedSearch {
    pub snippets: Vec<String>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedSearch {
    pub fn new(snippets: &[&str]) -> Self {
        Self {
            snippets: snippets.iter().map(|s| s.to_string()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            snippets: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WebSearch for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::WebSearch("503 from provider".to_string()));
        }
        Ok(self.snippets.iter().map(SearchResult::new).collect())
    }
}

/// Handles to a wired engine and its doubles
pub struct Harness {
    pub engine: WorkflowEngine,
    pub store: Arc<SessionEventStore>,
    pub oracle: Arc<ScriptedOracle>,
    pub retriever: Arc<StaticRetriever>,
    pub search: Option<Arc<ScriptedSearch>>,
    pub collaborators: Collaborators,
}

pub fn harness(
    oracle: ScriptedOracle,
    retriever: StaticRetriever,
    search: Option<ScriptedSearch>,
) -> Harness {
    harness_with_config(oracle, retriever, search, WorkflowConfig::default())
}

pub fn harness_with_config(
    oracle: ScriptedOracle,
    retriever: StaticRetriever,
    search: Option<ScriptedSearch>,
    config: WorkflowConfig,
) -> Harness {
    let oracle = Arc::new(oracle);
    let retriever = Arc::new(retriever);
    let search = search.map(Arc::new);
    let collaborators = Collaborators::new(
        Arc::clone(&oracle) as Arc<dyn JudgmentOracle>,
        Arc::clone(&retriever) as Arc<dyn Retriever>,
        search
            .as_ref()
            .map(|s| Arc::clone(s) as Arc<dyn WebSearch>),
    );
    let store = Arc::new(SessionEventStore::default());
    let engine = WorkflowEngine::new(collaborators.clone(), config, Arc::clone(&store));
    Harness {
        engine,
        store,
        oracle,
        retriever,
        search,
        collaborators,
    }
}

/// Event labels of a session, in recorded order
pub async fn labels(store: &SessionEventStore, session_id: &str) -> Vec<String> {
    store
        .get_events(session_id)
        .await
        .iter()
        .map(|e| e.label())
        .collect()
}
