use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::auth::{self, ApiKeyGuard};
use crate::config::ServerConfig;
use crate::handlers;
use crate::lifecycle::DocumentManager;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentManager,
    pub guard: ApiKeyGuard,
}

pub fn build_app(state: AppState, config: &ServerConfig) -> Router {
    let documents = Router::new()
        .route("/documents", post(handlers::create_document))
        .route(
            "/documents/{id}",
            get(handlers::download_document)
                .put(handlers::update_document)
                .delete(handlers::delete_document),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state.clone());

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .with_state(state)
        .merge(documents)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_seconds),
        ))
}
