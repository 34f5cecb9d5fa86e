pub mod app;
pub mod app_config;
pub mod crypto;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod orchestrator;
pub mod repositories;
pub mod schema;
pub mod services;
pub mod upstream;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use app::AppState;

/// Assembles the full router: OAuth surface, tool dispatcher, and the
/// ambient health endpoint, with tracing and CORS layered over everything.
pub fn build_router(state: AppState) -> Router {
    let cors = middleware::build_cors_layer(&state.config.cors_allowed_origins, state.config.developer_mode);

    Router::new()
        .route("/health", get(health_check))
        .merge(oauth::router())
        .merge(dispatcher::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let storage_healthy = match state.config.storage_driver {
        app_config::StorageDriver::Memory => true,
        app_config::StorageDriver::Durable => state
            .repositories
            .clients
            .find_by_id("__health_check__")
            .await
            .is_ok(),
    };

    Json(json!({
        "status": if storage_healthy { "healthy" } else { "degraded" },
        "service": "mcp-auth-bridge",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "components": {
            "storage_driver": match state.config.storage_driver {
                app_config::StorageDriver::Memory => "memory",
                app_config::StorageDriver::Durable => "durable",
            },
            "storage_healthy": storage_healthy,
        }
    }))
}
