mod api;
mod config;
mod handlers;
mod models;
mod services;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::FruitAnalyzer;
use services::{FruitDetector, OpenAiVisionService, RoboflowClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting Fruit Ripeness API...");

    let config = Config::from_env();

    if config.openai_api_key.is_none() {
        log::warn!("⚠️ OPENAI_API_KEY not configured - OpenAI features will not work");
    }
    let openai = Arc::new(OpenAiVisionService::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.request_timeout,
    )?);
    log::info!(
        "✅ OpenAI vision service initialized with model: {}",
        config.openai_model
    );

    // The CV model is only usable when both Roboflow settings are
    // present; otherwise it stays unavailable for the process lifetime.
    let cv: Option<Arc<dyn FruitDetector>> = match config.roboflow.clone() {
        Some(roboflow) => {
            let model_id = roboflow.model_id.clone();
            let client = RoboflowClient::new(roboflow, config.request_timeout)?;
            log::info!("✅ Roboflow CV client initialized (model: {})", model_id);
            Some(Arc::new(client))
        }
        None => {
            log::warn!("⚠️ Roboflow API key not configured - will use OpenAI for all predictions");
            None
        }
    };

    let analyzer = Arc::new(FruitAnalyzer::new(cv, openai.clone()));
    log::info!("✅ Fruit analyzer initialized");

    #[cfg(feature = "http-server")]
    {
        let app = api::server::create_api_router(analyzer.clone(), openai.clone());

        log::info!("🌐 API server starting on {}", config.bind_addr);
        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ API server error: {}", e);
            }
        });

        log::info!("✅ API server started");
    }

    log::info!("🎉 Service is ready!");

    // Keep running
    tokio::signal::ctrl_c().await?;

    log::info!("🛑 Shutting down...");

    Ok(())
}
