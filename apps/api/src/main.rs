mod activities;
mod auth;
mod calories;
mod challenges;
mod chatbot;
mod config;
mod db;
mod errors;
mod gamification;
mod googlefit;
mod llm_client;
mod ml;
mod models;
mod routes;
mod social;
mod state;
mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::SessionManager;
use crate::config::Config;
use crate::db::create_pool;
use crate::googlefit::client::GoogleFitClient;
use crate::llm_client::LlmClient;
use crate::ml::HttpPredictionService;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PeakPulse API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize prediction service client
    let ml = Arc::new(HttpPredictionService::new(
        &config.ml_api_url,
        config.ml_timeout_ms,
    )?);
    info!("ML service client initialized ({})", config.ml_api_url);

    // Optional integrations
    let llm = match config.groq_api_key.as_deref() {
        Some(key) => {
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(LlmClient::new(key.to_string())?)
        }
        None => {
            warn!("GROQ_API_KEY not set; chat assistant disabled");
            None
        }
    };

    let google_fit = match config.google_fit.clone() {
        Some(fit) => Some(GoogleFitClient::new(fit)?),
        None => {
            warn!("Google Fit OAuth client not configured; integration disabled");
            None
        }
    };

    let state = AppState {
        db,
        sessions: SessionManager::new(&config.session_secret, config.session_ttl_hours),
        ml,
        llm,
        google_fit,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
