//! HTTP endpoint called by the Asterisk dialplan when a handset dials the registration
//! service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::registration::RegistrationGateway;
use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: RegistrationGateway,
}

impl AppState {
    pub fn new(gateway: RegistrationGateway) -> Self {
        Self { gateway }
    }
}

/// Create the API router with the given rate limit.
pub fn create_router(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .route("/", get(handlers::usage).post(handlers::register))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        // Health check (no rate limiting)
        .route("/health", get(handlers::health))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
