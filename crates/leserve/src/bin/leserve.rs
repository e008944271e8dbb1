//! leserve binary entry point

use std::sync::Arc;

use anyhow::Context;
use lemodele::{ChatCompletionsClient, ModelConfig};
use lephase::{PipelineConfig, PipelineEngine};
use lerecherche::InMemoryIndex;
use leserve::{AppState, LeServeServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let model_config = ModelConfig::default().with_env_overrides();
    let model_name = model_config.model.clone();
    let model = ChatCompletionsClient::from_env(model_config).context("Failed to configure model client")?;

    let index = Arc::new(InMemoryIndex::new());
    let engine = PipelineEngine::new(PipelineConfig::default(), index.clone(), Arc::new(model))
        .context("Invalid pipeline configuration")?;

    let server = LeServeServer::new(AppState::new(engine, index, model_name, config))?;
    tracing::info!(url = %server.server_url(), "starting leserve");
    server.start().await?;

    Ok(())
}
