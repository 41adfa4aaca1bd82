mod handlers;
mod metrics;

use axum::routing::{get, post};
use axum::Router;
use blockcheck_common::config::VerifierConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub config: VerifierConfig,
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/verify", post(handlers::verify))
        .route("/api/v1/function-name", post(handlers::function_name))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Blockcheck API booting...");

    let config = VerifierConfig::load_default().map_err(|e| {
        error!("Failed to load verifier configuration: {}", e);
        e
    })?;
    info!(
        timeout_ms = config.default_limits.timeout_ms,
        max_call_count = config.default_limits.max_call_count,
        "Verifier limits loaded"
    );

    let state = Arc::new(AppState { config });

    let app = routes().with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    info!("Ready to verify submissions");

    axum::serve(listener, app).await?;
    Ok(())
}
