//! HTTP application assembly and the listening loop

use axum::{Router, http::HeaderValue, response::Redirect, routing::get};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::api_docs::ApiDoc;
use crate::infrastructure::AppState;
use crate::infrastructure::cache::build_cache;
use crate::infrastructure::config::Config;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let mut allowed = Vec::new();
    for origin in origins {
        match origin.parse::<HeaderValue>() {
            Ok(v) => allowed.push(v),
            Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
        }
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Full application: API under `/api` and `/api/v1`, health, docs, and the
/// request-level layers (CORS, tracing, timeout, in-flight limit).
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    api::error::set_verbose_errors(config.debug);

    Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api/schema/", ApiDoc::openapi()))
        .route("/", get(|| async { Redirect::to("/api/") }))
        .route("/health/", get(api::health::health_check))
        .route("/api/", get(api::api_root))
        .route("/api/v1/", get(api::api_root))
        .nest("/api", api::api_router())
        .nest("/api/v1", api::api_router())
        .with_state(state)
        .layer(GlobalConcurrencyLimitLayer::new(config.max_connections))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: Config, db: DatabaseConnection) -> std::io::Result<()> {
    let cache = build_cache(config.redis_url.as_deref()).await;
    let addr = format!("{}:{}", config.bind, config.port);
    let state = AppState::new(db, config).with_cache(cache);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Bookstore API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
