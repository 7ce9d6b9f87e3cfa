// Ragroute API server
// Serves the chat and event-feed endpoints until interrupted

use api_server::APIServer;
use clap::Parser;
use ragroute_engine::config::Config;
use ragroute_engine::events::SessionEventStore;
use ragroute_engine::service::{build_collaborators, ChatService};
use ragroute_engine::telemetry::init_telemetry_with_level;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Ragroute API server
#[derive(Parser, Debug)]
#[command(name = "ragroute-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_or_create()?,
    };

    init_telemetry_with_level(args.log.as_deref().unwrap_or(&config.core.log_level));
    tracing::info!("Ragroute API server v{}", env!("CARGO_PKG_VERSION"));

    let bind = match args.bind {
        Some(bind) => bind,
        None => config.server.bind_addr()?,
    };

    let store = Arc::new(SessionEventStore::new(config.events.subscriber_buffer));
    let collaborators = build_collaborators(&config)?;
    let service = Arc::new(ChatService::from_config(&config, collaborators, store));

    let mut server = APIServer::new(service);
    let addr = server.start(bind).await?;
    println!("Ragroute API listening on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received");
    server.stop().await;

    Ok(())
}
