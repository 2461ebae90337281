//! Parlor - a single-page chat front end for an `OpenAI`-compatible model
//!
//! Each browser session owns one conversation. Turns are kept in memory and
//! can be downloaded as CSV.

mod api;
mod config;
mod conversation;
mod llm;
mod runtime;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{LlmService, LoggingService, OpenAIService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    if config.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; chat requests will fail with an auth error");
    }

    let provider = OpenAIService::new(config.api_key.clone(), &config.model, &config.api_base)?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(provider)));

    tracing::info!(
        model = %config.model,
        api_base = %config.api_base,
        timeout_secs = config.request_timeout.as_secs(),
        session_idle_secs = config.session_idle_timeout.as_secs(),
        "Completion service configured"
    );

    let state = AppState::new(llm, config.request_timeout, config.session_idle_timeout);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Parlor listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
