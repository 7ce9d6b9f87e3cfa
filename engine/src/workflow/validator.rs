//! Groundedness validator
//!
//! Two-phase check of a generation: first whether it is supported by the
//! run's documents, then, only if it is, whether it answers the question.

use std::time::Instant;

use sdk::errors::EngineError;
use sdk::events::{EventPayload, StepType};
use sdk::types::BinaryScore;
use tracing::{debug, error};

use crate::workflow::{with_timeout, RunState, StageContext};

/// Separator between documents in the fact set shown to the hallucination grader
pub const FACTS_SEPARATOR: &str = "\n\n---\n\n";

/// Outcome of validating one generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundednessVerdict {
    /// Claims are not supported by the documents
    NotGrounded,
    /// Grounded and answers the question
    Useful,
    /// Grounded but does not answer the question
    NotUseful,
}

/// Validate the run's current generation
///
/// A blank generation is not grounded and no grader is consulted.
pub async fn validate(
    ctx: &StageContext<'_>,
    state: &RunState,
) -> Result<GroundednessVerdict, EngineError> {
    if let Err(e) = state.validate("hallucination_check") {
        return Err(ctx
            .fail(StepType::HallucinationCheck, e, Instant::now())
            .await);
    }

    if state.generation.trim().is_empty() {
        debug!("Blank generation, skipping graders");
        return Ok(GroundednessVerdict::NotGrounded);
    }

    let facts = state.joined_documents(FACTS_SEPARATOR);
    let start = Instant::now();
    let grounded = with_timeout(
        "oracle",
        ctx.config.oracle_timeout(),
        ctx.collaborators
            .oracle
            .grade_hallucination(&facts, &state.generation),
    )
    .await;
    let grounded = match grounded {
        Ok(grounded) => grounded,
        Err(e) => {
            error!("Hallucination check failed: {}", e);
            ctx.emitter
                .failed(StepType::HallucinationCheck, e.to_string(), start.elapsed())
                .await;
            return Err(e);
        }
    };
    ctx.emitter
        .completed(
            StepType::HallucinationCheck,
            EventPayload::Hallucination {
                grounded,
                score: BinaryScore::from(grounded),
            },
            start.elapsed(),
        )
        .await;

    if !grounded {
        debug!("Generation is not grounded in documents");
        return Ok(GroundednessVerdict::NotGrounded);
    }

    let start = Instant::now();
    let useful = with_timeout(
        "oracle",
        ctx.config.oracle_timeout(),
        ctx.collaborators
            .oracle
            .grade_answer_relevance(&state.question, &state.generation),
    )
    .await;
    let useful = match useful {
        Ok(useful) => useful,
        Err(e) => {
            error!("Answer grading failed: {}", e);
            ctx.emitter
                .failed(StepType::AnswerGrading, e.to_string(), start.elapsed())
                .await;
            return Err(e);
        }
    };
    ctx.emitter
        .completed(
            StepType::AnswerGrading,
            EventPayload::AnswerGrade {
                useful,
                score: BinaryScore::from(useful),
            },
            start.elapsed(),
        )
        .await;

    Ok(if useful {
        GroundednessVerdict::Useful
    } else {
        GroundednessVerdict::NotUseful
    })
}
