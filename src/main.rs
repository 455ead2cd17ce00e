use std::error::Error;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

mod app_state;
mod response_envelope;
mod routes;

use app_state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file.
    // Fails if .env file not found, not readable or invalid.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = Arc::new(AppState::from_env()?);

    let app = Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/reviews/trigger", post(routes::trigger_review))
        .with_state(state);

    let addr = std::env::var("REVMAN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "revman listening");
    axum::serve(listener, app).await?;

    Ok(())
}
