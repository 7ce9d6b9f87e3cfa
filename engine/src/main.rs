// Ragroute adaptive RAG engine
// Main entry point for the ragroute binary

use clap::Parser;
use ragroute_engine::cli::{Cli, Command, ConfigAction};
use ragroute_engine::config::Config;
use ragroute_engine::handlers::{
    handle_ask, handle_config_path, handle_config_show, handle_doctor, OutputFormat,
};
use ragroute_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // `config path` must work even when the file does not parse
    if let Command::Config {
        action: ConfigAction::Path,
    } = &cli.command
    {
        return handle_config_path(cli.config.as_deref());
    }

    let config = match &cli.config {
        Some(config_path) => Config::load_from_path(config_path),
        None => Config::load_or_create(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            // Surface the failure through the log as well as the exit error
            init_telemetry();
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // --log wins over the config level; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Ragroute v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Ask { question, session } => handle_ask(question, session, &config, format).await,

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(cli.config.as_deref()),
        },

        Command::Doctor => handle_doctor(&config, format).await,
    }
}
