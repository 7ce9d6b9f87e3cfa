use std::time::Instant;

use sdk::errors::EngineError;
use sdk::events::{DocumentGrade, EventPayload, StepType, DOCUMENT_PREVIEW_CHARS};
use sdk::types::{preview, BinaryScore, Document};
use tracing::{debug, error};

use crate::workflow::{with_timeout, RunState, StageContext};

/// Keep only relevant documents and flag the run for web search if any were dropped
pub async fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<(), EngineError> {
    ctx.emitter.started(StepType::GradeDocuments).await;
    let start = Instant::now();
    if let Err(e) = state.validate("grade_documents") {
        return Err(ctx.fail(StepType::GradeDocuments, e, start).await);
    }

    match grade_all(ctx, &state.question, &state.documents).await {
        Ok(scores) => {
            let mut grades = Vec::with_capacity(scores.len());
            let mut relevant = Vec::new();
            let mut web_search_flag = false;

            for (document, score) in std::mem::take(&mut state.documents).into_iter().zip(scores) {
                grades.push(DocumentGrade {
                    content_preview: preview(document.content(), DOCUMENT_PREVIEW_CHARS),
                    grade: score,
                    source: document.source().to_string(),
                });
                if score.is_yes() {
                    relevant.push(document);
                } else {
                    web_search_flag = true;
                }
            }

            debug!(
                "{} of {} documents relevant, web search flag {}",
                relevant.len(),
                grades.len(),
                web_search_flag
            );
            let relevant_documents = relevant.len();
            state.documents = relevant;
            state.web_search_flag = web_search_flag;

            ctx.emitter
                .completed(
                    StepType::GradeDocuments,
                    EventPayload::Graded {
                        documents_graded: grades,
                        relevant_documents,
                    },
                    start.elapsed(),
                )
                .await;
            Ok(())
        }
        Err(e) => {
            error!("Document grading failed: {}", e);
            ctx.emitter
                .failed(StepType::GradeDocuments, e.to_string(), start.elapsed())
                .await;
            Err(e)
        }
    }
}

async fn grade_all(
    ctx: &StageContext<'_>,
    question: &str,
    documents: &[Document],
) -> Result<Vec<BinaryScore>, EngineError> {
    let mut scores = Vec::with_capacity(documents.len());
    for document in documents {
        scores.push(grade_one(ctx, question, document).await?);
    }
    Ok(scores)
}

/// Blank documents are irrelevant without asking the oracle
async fn grade_one(
    ctx: &StageContext<'_>,
    question: &str,
    document: &Document,
) -> Result<BinaryScore, EngineError> {
    if document.is_blank() {
        return Ok(BinaryScore::No);
    }
    with_timeout(
        "oracle",
        ctx.config.oracle_timeout(),
        ctx.collaborators
            .oracle
            .grade_document(question, document.content()),
    )
    .await
}
