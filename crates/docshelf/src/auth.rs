//! API key access guard.
//!
//! Every `/documents` request must carry the shared secret in `X-API-KEY`.
//! Health probes are not guarded.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::response;
use crate::server::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Holds the shared secret and compares candidates in constant time.
#[derive(Clone)]
pub struct ApiKeyGuard {
    key: Arc<[u8]>,
}

impl ApiKeyGuard {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: Arc::from(key.as_ref().as_bytes()),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        self.key.as_ref().ct_eq(candidate.as_bytes()).into()
    }
}

impl std::fmt::Debug for ApiKeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGuard").finish_non_exhaustive()
    }
}

/// Middleware rejecting requests without a valid API key.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| state.guard.verify(key));

    if authorized {
        return next.run(req).await;
    }

    warn!(
        method = %req.method(),
        path = %req.uri().path(),
        "Rejected request with invalid or missing API key"
    );
    response::unauthorized("invalid or missing API key").into_response()
}
