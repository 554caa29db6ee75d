use anyhow::{Context, Result};
use pdm_data_api::{config::StreamerConfig, logging, web, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    tracing::info!("🚀 Starting dataset stream server");

    // Load configuration
    let config = StreamerConfig::from_env().context("invalid streamer configuration")?;

    // Load the dataset before binding; a bad file stops startup here
    let dataset_path = config.dataset_path.clone();
    let state = AppState::load(config)
        .with_context(|| format!("failed to load dataset {}", dataset_path.display()))?;

    // Start web server
    web::start_server(state).await?;

    Ok(())
}
