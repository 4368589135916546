//! # Request Handlers
//!
//! Axum request handlers for the payment API.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use procurepay_core::{
    CheckoutRequest, DispatchOutcome, IntentRequest, PaymentError, PaymentIntentReference,
};
use procurepay_stripe::SIGNATURE_HEADER;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn payment_error_to_response(err: PaymentError) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn signature_header(headers: &HeaderMap) -> Result<&str, &'static str> {
    headers
        .get(SIGNATURE_HEADER)
        .ok_or("Missing stripe-signature header")?
        .to_str()
        .map_err(|_| "Invalid stripe-signature header")
}

fn webhook_error(status: StatusCode, message: impl std::fmt::Display) -> (StatusCode, String) {
    (status, format!("Webhook Error: {}", message))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "procurepay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a payment intent for a procurement checkout
#[instrument(skip(state, payload))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<PaymentIntentReference>, ApiError> {
    let Json(checkout) = payload.map_err(|rejection| {
        warn!("Rejected checkout body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(rejection.body_text(), 400)),
        )
    })?;

    // Validate before anything reaches the provider
    let request = IntentRequest::from_checkout(checkout, state.merchant()).map_err(|e| {
        warn!("Invalid checkout request: {}", e);
        payment_error_to_response(e)
    })?;

    info!(
        procurement_id = %request.procurement_id,
        amount = request.amount,
        "Creating payment intent via {}",
        state.strategy.provider_name()
    );

    let reference = state.strategy.create_intent(&request).await.map_err(|e| {
        if e.is_client_error() {
            warn!(procurement_id = %request.procurement_id, "Payment intent rejected: {}", e);
        } else {
            error!(procurement_id = %request.procurement_id, "Failed to create payment intent: {}", e);
        }
        payment_error_to_response(e)
    })?;

    Ok(Json(reference))
}

/// Handle Stripe webhook
///
/// The body is taken as raw bytes; it must reach signature verification
/// untouched.
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let signature = signature_header(&headers).map_err(|message| {
        warn!("Webhook rejected: {}", message);
        webhook_error(StatusCode::BAD_REQUEST, message)
    })?;

    let event = state
        .strategy
        .verify_webhook(&body, signature)
        .map_err(|e| {
            warn!("Webhook verification failed: {}", e);
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            webhook_error(status, e)
        })?;

    info!(
        event_id = %event.id,
        event_type = %event.kind.name(),
        "Received webhook"
    );

    match state.dispatcher.dispatch(&event).await {
        Ok(DispatchOutcome::Delivered) => {
            if let Some(pi) = event.payment_intent() {
                info!(
                    event_id = %event.id,
                    procurement_id = pi.procurement_id().unwrap_or("unknown"),
                    "Webhook delivered to ledger"
                );
            }
        }
        Ok(DispatchOutcome::Dropped) => {
            error!(event_id = %event.id, "Ledger update lost, redelivery worker unavailable");
        }
        Ok(outcome) => {
            info!(event_id = %event.id, ?outcome, "Webhook acknowledged");
        }
        Err(e) => {
            // nothing was delegated; let the provider redeliver
            error!(event_id = %event.id, "Webhook dispatch failed: {}", e);
            return Err(webhook_error(StatusCode::INTERNAL_SERVER_ERROR, e));
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}
