//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - ask: Answer one question through the workflow
//! - config show / path: Inspect the effective configuration
//! - doctor: Check provider and web search availability

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::events::SessionEventStore;
use crate::search::TavilySearch;
use crate::service::{build_collaborators, build_router, ChatResponse, ChatService};
use sdk::events::ProcessEvent;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Answer a question
///
/// Runs the full workflow in-process. In text mode the recorded step
/// trail is printed after the answer.
pub async fn handle_ask(
    question: String,
    session: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let store = Arc::new(SessionEventStore::new(config.events.subscriber_buffer));
    let collaborators =
        build_collaborators(config).context("Failed to build workflow collaborators")?;
    let service = ChatService::from_config(config, collaborators, Arc::clone(&store));

    let response = service.ask(&question, session.as_deref()).await?;
    let events = store.get_events(&response.session_id).await;

    match format {
        OutputFormat::Text => print_response(&response, &events),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn print_response(response: &ChatResponse, events: &[ProcessEvent]) {
    println!("{}", response.answer);
    println!();

    if !response.sources.is_empty() {
        println!("Sources:");
        for (i, source) in response.sources.iter().enumerate() {
            let origin = source
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or("local");
            println!("  {}. [{}] {}", i + 1, origin, source.content_preview);
        }
        println!();
    }

    println!(
        "Session: {}  Web search: {}",
        response.session_id,
        if response.used_web_search { "yes" } else { "no" }
    );

    if !events.is_empty() {
        println!("Steps:");
        for event in events {
            match event.duration_ms {
                Some(ms) => println!("  {:<32} {}ms", event.label(), ms),
                None => println!("  {}", event.label()),
            }
        }
    }
}

/// Show the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Print where the configuration file lives
pub fn handle_config_path(config_override: Option<&std::path::Path>) -> Result<()> {
    let path = match config_override {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    println!("{}", path.display());
    Ok(())
}

/// Run system diagnostics
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, &str)> = Vec::new();

    checks.push(("Configuration".to_string(), "Valid"));

    let router = build_router(config);
    let health = router.check_health().await;
    for (name, healthy) in &health {
        checks.push((
            format!("Provider {}", name),
            if *healthy { "Available" } else { "Not available" },
        ));
    }
    if !health.iter().any(|(_, healthy)| *healthy) {
        issues.push("No LLM providers available. Start Ollama or set an API key.".to_string());
    }

    if TavilySearch::from_config(&config.search).is_some() {
        checks.push(("Web search".to_string(), "Configured"));
    } else {
        checks.push(("Web search".to_string(), "Not configured"));
        issues.push(format!(
            "Web search answers will be fallbacks. Set {} to enable it.",
            config.search.api_key_env
        ));
    }

    match config.corpus_path() {
        Some(path) if path.exists() => checks.push(("Retrieval corpus".to_string(), "Found")),
        Some(path) => {
            checks.push(("Retrieval corpus".to_string(), "Missing"));
            issues.push(format!("Corpus file does not exist: {}", path.display()));
        }
        None => checks.push(("Retrieval corpus".to_string(), "Not configured")),
    }

    match format {
        OutputFormat::Text => {
            println!("Ragroute System Diagnostics");
            println!("============================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
