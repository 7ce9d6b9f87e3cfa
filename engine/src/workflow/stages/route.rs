use std::time::Instant;

use sdk::errors::EngineError;
use sdk::events::{EventPayload, StepType};
use sdk::types::RouteClassification;
use tracing::{error, info};

use crate::workflow::{with_timeout, RunState, StageContext};

/// Ask the oracle which datasource should answer the question
pub async fn run(
    ctx: &StageContext<'_>,
    state: &RunState,
) -> Result<RouteClassification, EngineError> {
    ctx.emitter.started(StepType::Routing).await;
    let start = Instant::now();
    if let Err(e) = state.validate("routing") {
        return Err(ctx.fail(StepType::Routing, e, start).await);
    }

    let result = with_timeout(
        "oracle",
        ctx.config.oracle_timeout(),
        ctx.collaborators.oracle.classify_route(&state.question),
    )
    .await;

    match result {
        Ok(route) => {
            info!("Routing question to {}", route.decision);
            ctx.emitter
                .completed(
                    StepType::Routing,
                    EventPayload::Routing {
                        decision: route.decision,
                        confidence: route.confidence,
                        reasoning: route.reasoning.clone(),
                    },
                    start.elapsed(),
                )
                .await;
            Ok(route)
        }
        Err(e) => {
            error!("Routing failed: {}", e);
            ctx.emitter
                .failed(StepType::Routing, e.to_string(), start.elapsed())
                .await;
            Err(e)
        }
    }
}
