use std::time::Instant;

use sdk::errors::EngineError;
use sdk::events::{EventPayload, StepType};
use tracing::{debug, error};

use crate::workflow::{with_timeout, RunState, StageContext};

/// Replace the run's documents with the retriever's results
pub async fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<(), EngineError> {
    ctx.emitter.started(StepType::Retrieve).await;
    let start = Instant::now();
    if let Err(e) = state.validate("retrieve") {
        return Err(ctx.fail(StepType::Retrieve, e, start).await);
    }

    let result = with_timeout(
        "retriever",
        ctx.config.retriever_timeout(),
        ctx.collaborators.retriever.retrieve(&state.question),
    )
    .await;

    match result {
        Ok(documents) => {
            debug!("Retrieved {} documents", documents.len());
            let documents_found = documents.len();
            state.documents = documents;
            ctx.emitter
                .completed(
                    StepType::Retrieve,
                    EventPayload::Retrieved { documents_found },
                    start.elapsed(),
                )
                .await;
            Ok(())
        }
        Err(e) => {
            error!("Retrieval failed: {}", e);
            ctx.emitter
                .failed(StepType::Retrieve, e.to_string(), start.elapsed())
                .await;
            Err(e)
        }
    }
}
