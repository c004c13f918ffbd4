//! Router assembly.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower::ServiceBuilder;

use crate::handlers;
use crate::middleware::{guard, request_log, response_headers};
use crate::state::AppState;

/// Build the gateway router.
///
/// Middleware order, outermost first: request log, response headers, guard
/// pipeline. Guard denials therefore still carry security headers and the
/// request ID.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/csrf-token", get(handlers::csrf_token))
        .route("/api/generate", post(handlers::generate))
        .route("/banner/:file", get(handlers::asset))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_log))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    response_headers,
                ))
                .layer(middleware::from_fn_with_state(state.clone(), guard))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
