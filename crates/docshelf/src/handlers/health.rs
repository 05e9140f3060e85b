use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Ready once the record store answers and the upload directory exists.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let manager = state.documents.clone();
    match tokio::task::spawn_blocking(move || manager.check_ready()).await {
        Ok(Ok(())) => (StatusCode::OK, "ok"),
        Ok(Err(e)) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
        Err(e) => {
            warn!(error = %e, "Readiness check task failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}
