use std::time::Instant;

use sdk::errors::EngineError;
use sdk::events::{EventPayload, StepType};
use sdk::types::{Document, Metadata};
use tracing::{info, warn};

use crate::workflow::{with_timeout, RunState, StageContext};

/// Search the web and append one document with the findings
///
/// Never fails on a search problem: an unconfigured, failing or slow
/// provider yields an explanatory document instead.
pub async fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<(), EngineError> {
    let attempt = match state
        .validate("websearch")
        .and_then(|()| state.record_web_search())
    {
        Ok(attempt) => attempt,
        Err(e) => {
            ctx.emitter.started(StepType::Websearch).await;
            return Err(ctx.fail(StepType::Websearch, e, Instant::now()).await);
        }
    };
    ctx.emitter
        .started_with(StepType::Websearch, Some(attempt), Some(state.question.clone()))
        .await;
    let start = Instant::now();

    let outcome = search(ctx, &state.question).await;

    let (document, sources_found, fallback) = match outcome {
        Ok((content, sources_found, provider)) => {
            info!("Web search returned {} sources", sources_found);
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), provider.into());
            (Document::with_metadata(content, metadata), sources_found, false)
        }
        Err(e) => {
            warn!("Web search unavailable, using fallback: {}", e);
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), "web_search_fallback".into());
            (
                Document::with_metadata(fallback_text(&e, &state.question), metadata),
                0,
                true,
            )
        }
    };

    state.documents.push(document);

    ctx.emitter
        .completed(
            StepType::Websearch,
            EventPayload::WebSearched {
                query: state.question.clone(),
                sources_found,
                fallback,
            },
            start.elapsed(),
        )
        .await;
    Ok(())
}

/// Run the provider and join its snippets, one per line
async fn search(
    ctx: &StageContext<'_>,
    query: &str,
) -> Result<(String, usize, String), EngineError> {
    let provider = ctx
        .collaborators
        .web_search
        .as_ref()
        .ok_or(EngineError::WebSearchUnavailable)?;

    let results = with_timeout(
        "web search",
        ctx.config.search_timeout(),
        provider.search(query),
    )
    .await?;

    let content = results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Ok((content, results.len(), provider.name().to_string()))
}

fn fallback_text(error: &EngineError, question: &str) -> String {
    match error {
        EngineError::WebSearchUnavailable => format!(
            "I apologize, but I cannot perform a web search for '{}' at the moment due to a configuration issue. Please check your TAVILY_API_KEY environment variable.",
            question
        ),
        _ => format!(
            "I encountered an error while searching for information about '{}'. Please try again or rephrase your question.",
            question
        ),
    }
}
