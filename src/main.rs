mod api;
mod config;
mod error;
mod handlers;
mod models;
mod services;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use api::create_router;
use config::Config;
use handlers::MealAnalysisHandler;
use services::{ImageLoader, OpenRouterService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Meal Analysis Service...");

    let config = Config::from_env()?;

    if !config.public_dir.is_dir() {
        log::warn!(
            "⚠️ PUBLIC_DIR {} is not a directory, every analysis will fail with not found",
            config.public_dir.display()
        );
    }
    let images = ImageLoader::new(config.public_dir.clone());
    log::info!("✅ Image root: {}", images.root().display());

    let ai = Arc::new(OpenRouterService::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.temperature,
        config.max_tokens,
    ));
    log::info!(
        "✅ LLM client initialized: {} (temperature {}, max_tokens {})",
        config.base_url,
        config.temperature,
        config.max_tokens
    );

    let analysis_handler = Arc::new(MealAnalysisHandler::new(images, ai));
    let app = create_router(analysis_handler);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    log::info!("🌐 Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    log::info!("🛑 Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("🛑 Shutting down...");
}
