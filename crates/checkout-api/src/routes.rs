//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
///   - GET  /health - Health check
///   - GET  /api/v1/payment/config - Embedded form settings
///   - POST /api/v1/carts/{cart_id}/payment - Pay and place the order
///   - GET  /api/v1/payments/{attempt_id} - Result after authentication
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/payment/config", get(handlers::payment_config))
        .route("/carts/{cart_id}/payment", post(handlers::submit_payment))
        .route("/payments/{attempt_id}", get(handlers::payment_status));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
