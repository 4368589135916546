//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub const CREATE_INTENT_PATH: &str = "/api/create-payment-intent";
pub const STRIPE_WEBHOOK_PATH: &str = "/api/stripe-webhook";

/// Create the main application router
///
/// Routes:
/// - GET  /health (and /) - Health check
/// - POST /api/create-payment-intent - Create a payment intent
/// - POST /api/stripe-webhook - Stripe webhook handler (raw body)
pub fn create_router(state: AppState) -> Router {
    // Checkout is called from the buyer's browser
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(CREATE_INTENT_PATH, post(handlers::create_payment_intent))
        .layer(cors);

    // Webhook routes (no CORS, must accept raw body)
    let webhook_routes = Router::new().route(STRIPE_WEBHOOK_PATH, post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .merge(api_routes)
        .merge(webhook_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
