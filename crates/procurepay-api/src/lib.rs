//! # procurepay-api
//!
//! HTTP API layer for procurepay.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Payment intent creation for procurement checkouts
//! - Signed Stripe webhook receiver with idempotent dispatch
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/create-payment-intent` | Create payment intent |
//! | POST | `/api/stripe-webhook` | Stripe webhook |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
