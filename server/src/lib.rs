//! LeadForge HTTP server.
//!
//! Exposes the lead, dashboard, analytics, export, settings, database,
//! prospecting, web scraping and email marketing APIs over axum. The
//! [`router`] is built from an [`AppState`] so tests can drive it with fake
//! network services.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod maintenance;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = routes::router().layer(middleware::from_fn_with_state(
        state.rate_limiter.clone(),
        rate_limit::limit_requests,
    ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(cors(&state.config.server.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Invalid frontend_url {:?}, allowing any origin: {}", frontend_url, e);
            cors.allow_origin(Any)
        }
    }
}

/// Bind to `server.bind` and serve until Ctrl-C.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind = state.config.server.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("LeadForge API listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down");
    })
    .await?;
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    environment: String,
    bind: String,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {}", e);
            "unavailable"
        }
    };
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        environment: state.config.server.environment.clone(),
        bind: state.config.server.bind.clone(),
        database,
    })
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
