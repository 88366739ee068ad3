mod cli;
mod config;
mod errors;
mod generation;
mod jobs;
mod llm_client;
mod personas;
mod render;
mod routes;
mod sources;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{LanguageModel, LlmClient};
use crate::routes::build_router;
use crate::sources::reader::ReaderClient;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "persona-api")]
#[command(about = "AI user persona generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,

    /// Generate personas against a running server and save the PDF
    Generate(cli::GenerateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Generate(args) => cli::run(args).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Persona API v{}", env!("CARGO_PKG_VERSION"));

    // LLM client is optional: without a key the generate routes answer with a configuration error
    let llm: Option<Arc<dyn LanguageModel>> = match &config.anthropic_api_key {
        Some(key) => {
            let client = LlmClient::new(key.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(client))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; generation requests will be rejected");
            None
        }
    };

    let reader = ReaderClient::new(config.reader_base_url.clone(), config.jina_api_key.clone())?;
    info!("Reader client initialized ({})", config.reader_base_url);

    let state = AppState::new(config.clone(), llm, Arc::new(reader));

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
