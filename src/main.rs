use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bus;
mod chat;
mod config;
mod context;
mod conversation;
mod dashboard;
mod dataset;
mod llm;
#[cfg(test)]
mod test_support;

use dashboard::DashboardState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Insightdesk starting...");

    let config = config::AppConfig::from_env()?;
    let event_bus = Arc::new(bus::EventBus::new());
    let shutdown = CancellationToken::new();

    info!(
        "Loading datasets: report={}, sentiment={}, interactions={}",
        config.sources.report.location(),
        config.sources.sentiment.location(),
        config.sources.interactions.location()
    );

    let http = reqwest::Client::new();
    let dashboard = match dataset::load_datasets(&config.sources, &http).await {
        Ok(datasets) => {
            let generator = llm::OllamaClient::new(config.generation.clone(), shutdown.clone());
            info!(
                "Using model {} at {}",
                generator.settings().model,
                generator.settings().base_url
            );
            let conversation = conversation::Conversation::new(
                Arc::new(datasets),
                Arc::new(generator),
                config.limits,
                event_bus.clone(),
            );
            DashboardState::Ready(Arc::new(conversation))
        }
        Err(e) => {
            error!("Dashboard unavailable, {} failed: {}", e.dataset(), e);
            DashboardState::Unavailable {
                reason: e.to_string(),
            }
        }
    };

    let app = dashboard::server::router(Arc::new(dashboard::server::AppState {
        dashboard,
        event_bus,
    }));

    info!("Starting dashboard API on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            shutdown.cancel();
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                error!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
