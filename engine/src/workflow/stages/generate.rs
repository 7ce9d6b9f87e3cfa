use std::time::Instant;

use sdk::errors::EngineError;
use sdk::events::{EventPayload, StepType, GENERATION_PREVIEW_CHARS};
use sdk::types::preview;
use tracing::{debug, error};

use super::CONTEXT_SEPARATOR;
use crate::workflow::{with_timeout, RunState, StageContext};

/// Draft an answer from the current documents
pub async fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<(), EngineError> {
    let attempt = match state
        .validate("generate")
        .and_then(|()| state.record_generation())
    {
        Ok(attempt) => attempt,
        Err(e) => {
            ctx.emitter.started(StepType::Generate).await;
            return Err(ctx.fail(StepType::Generate, e, Instant::now()).await);
        }
    };
    ctx.emitter
        .started_with(StepType::Generate, Some(attempt), None)
        .await;
    let start = Instant::now();

    let context = state.joined_documents(CONTEXT_SEPARATOR);
    let result = with_timeout(
        "oracle",
        ctx.config.oracle_timeout(),
        ctx.collaborators.oracle.generate(&context, &state.question),
    )
    .await;

    match result {
        Ok(generation) => {
            debug!(
                "Generation attempt {} produced {} chars",
                attempt,
                generation.len()
            );
            let generation_preview = preview(&generation, GENERATION_PREVIEW_CHARS);
            state.generation = generation;
            ctx.emitter
                .completed(
                    StepType::Generate,
                    EventPayload::Generated {
                        attempt,
                        generation_preview,
                    },
                    start.elapsed(),
                )
                .await;
            Ok(())
        }
        Err(e) => {
            error!("Generation attempt {} failed: {}", attempt, e);
            ctx.emitter
                .failed(StepType::Generate, e.to_string(), start.elapsed())
                .await;
            Err(e)
        }
    }
}
