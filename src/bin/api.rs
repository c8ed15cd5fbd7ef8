use market_reader_core::{
    api::start_server,
    backend::backend_from_config,
    config::ReaderConfig,
    pipeline::MarketPipeline,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = ReaderConfig::from_env()?;

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Market Reader Core - API Server");
    info!(
        provider = ?config.model.provider,
        max_depth = config.max_depth,
        ai_risk = config.use_ai_risk,
        "Configuration loaded"
    );

    let backend = backend_from_config(&config.model);
    let pipeline = Arc::new(MarketPipeline::new(backend, &config));

    info!("Pipeline initialized, starting API server on port {}", api_port);

    start_server(pipeline, api_port).await?;

    Ok(())
}
