use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod config;
mod gateway;
mod knowledge;
mod llm;
mod report;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::knowledge::KnowledgeBase;
use crate::llm::LlmManager;
use crate::report::log::QueryLogger;
use crate::report::pipeline::ReportPipeline;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging
    init_tracing(&config.logging.format);

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;
    if !llm_manager.has_credentials() {
        error!("No LLM API key configured; report requests will fail until one is set");
    }

    let gateways = gateway::connect(&config.gateway)?;
    info!("Using {} gateway", gateways.backend);

    let knowledge = Arc::new(KnowledgeBase::load(&config.knowledge)?);
    info!("Knowledge base version {}", knowledge.version);

    let logger = Arc::new(QueryLogger::from_config(&config.query_log, &knowledge).await?);

    let pipeline = ReportPipeline::new(
        Arc::new(llm_manager),
        gateways.schema,
        gateways.query,
        knowledge,
        logger,
        config.pipeline.clone(),
        Duration::from_secs(config.gateway.timeout_secs),
    );

    let app_state = Arc::new(AppState::new(config.clone(), pipeline));

    // Start the web server
    info!("Starting report server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
