//! # Stripe Payment Intents
//!
//! Implementation of the Stripe PaymentIntents API.
//! The browser confirms the intent with the returned client secret.

use crate::config::StripeConfig;
use crate::signature::WebhookVerifier;
use crate::webhook::parse_event;
use async_trait::async_trait;
use procurepay_core::{
    IntentRequest, PaymentError, PaymentIntentReference, PaymentResult, PaymentStrategy,
    WebhookEvent,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const PROVIDER: &str = "stripe";

/// Stripe PaymentIntents strategy
///
/// Constructed once at startup and shared by every request.
pub struct StripeIntentStrategy {
    config: StripeConfig,
    client: Client,
    verifier: WebhookVerifier,
}

impl StripeIntentStrategy {
    /// Create a new Stripe intent strategy
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let verifier = WebhookVerifier::new(&config.webhook_secret, config.webhook_tolerance_secs);

        Ok(Self {
            config,
            client,
            verifier,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Build form fields for `POST /v1/payment_intents`
    fn build_form(request: &IntentRequest) -> Vec<(String, String)> {
        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            ("description".to_string(), request.description.clone()),
            (
                "capture_method".to_string(),
                request.capture_method.as_str().to_string(),
            ),
        ];

        if let Some(usage) = request.setup_future_usage {
            form_params.push((
                "setup_future_usage".to_string(),
                usage.as_str().to_string(),
            ));
        }

        for (key, value) in &request.metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        form_params
    }

    /// Map a non-2xx Stripe response to a payment error
    fn api_error(status: StatusCode, body: &str) -> PaymentError {
        let message = serde_json::from_str::<StripeErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status {
            StatusCode::BAD_REQUEST | StatusCode::PAYMENT_REQUIRED => {
                PaymentError::ProviderRejected {
                    provider: PROVIDER.to_string(),
                    message,
                }
            }
            _ => PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message,
            },
        }
    }
}

#[async_trait]
impl PaymentStrategy for StripeIntentStrategy {
    #[instrument(skip(self, request), fields(procurement_id = %request.procurement_id, amount = request.amount))]
    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<PaymentIntentReference> {
        let form_params = Self::build_form(request);
        let idempotency_key = Uuid::new_v4().to_string();

        debug!(
            "Creating Stripe payment intent: currency={}, capture_method={}",
            request.currency,
            request.capture_method.as_str()
        );

        let url = format!("{}/v1/payment_intents", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &idempotency_key)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(Self::api_error(status, &body));
        }

        let intent: StripePaymentIntentResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("Failed to parse Stripe response: {}", e),
            }
        })?;

        let client_secret = intent.client_secret.ok_or_else(|| PaymentError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("Payment intent {} has no client_secret", intent.id),
        })?;

        info!(payment_intent_id = %intent.id, "Created Stripe payment intent");

        Ok(PaymentIntentReference {
            client_secret,
            payment_intent_id: intent.id,
        })
    }

    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookEvent> {
        self.verifier.verify(payload, signature)?;
        let event = parse_event(payload)?;

        debug!(event_id = %event.id, event_type = %event.kind.name(), "Verified Stripe webhook");
        Ok(event)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::signature_header;
    use chrono::Utc;
    use procurepay_core::{CheckoutRequest, EventKind, MerchantProfile, SetupFutureUsage};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET_KEY: &str = "sk_test_abc123";
    const WEBHOOK_SECRET: &str = "whsec_test_secret";

    fn strategy(base_url: &str) -> StripeIntentStrategy {
        let config = StripeConfig::new(SECRET_KEY, WEBHOOK_SECRET).with_api_base_url(base_url);
        StripeIntentStrategy::new(config).unwrap()
    }

    fn request() -> IntentRequest {
        IntentRequest::from_checkout(
            CheckoutRequest::new(150_000, "PO-42"),
            &MerchantProfile::default(),
        )
        .unwrap()
    }

    fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_build_form() {
        let form = StripeIntentStrategy::build_form(&request());

        assert_eq!(form_value(&form, "amount"), Some("150000"));
        assert_eq!(form_value(&form, "currency"), Some("usd"));
        assert_eq!(form_value(&form, "automatic_payment_methods[enabled]"), Some("true"));
        assert_eq!(form_value(&form, "capture_method"), Some("automatic"));
        assert_eq!(form_value(&form, "metadata[procurement_id]"), Some("PO-42"));
        assert_eq!(form_value(&form, "metadata[company]"), Some("SABERDOG LLC"));
        assert!(form_value(&form, "setup_future_usage").is_none());
    }

    #[test]
    fn test_build_form_with_setup_future_usage() {
        let merchant = MerchantProfile {
            setup_future_usage: Some(SetupFutureUsage::OffSession),
            ..MerchantProfile::default()
        };
        let request =
            IntentRequest::from_checkout(CheckoutRequest::new(100, "PO-1"), &merchant).unwrap();
        let form = StripeIntentStrategy::build_form(&request);

        assert_eq!(form_value(&form, "setup_future_usage"), Some("off_session"));
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"error":{"message":"Amount must be at least $0.50 usd","type":"invalid_request_error","param":"amount"}}"#;
        let err = StripeIntentStrategy::api_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, PaymentError::ProviderRejected { ref message, .. } if message == "Amount must be at least $0.50 usd"));

        let err = StripeIntentStrategy::api_error(StatusCode::UNAUTHORIZED, r#"{"error":{"message":"Invalid API Key provided"}}"#);
        assert_eq!(err.status_code(), 502);

        let err = StripeIntentStrategy::api_error(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_create_intent_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", "Bearer sk_test_abc123"))
            .and(header_exists("idempotency-key"))
            .and(body_string_contains("amount=150000"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains("automatic_payment_methods%5Benabled%5D=true"))
            .and(body_string_contains("metadata%5Bprocurement_id%5D=PO-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_test_123",
                "object": "payment_intent",
                "amount": 150000,
                "currency": "usd",
                "client_secret": "pi_test_123_secret_xyz",
                "status": "requires_payment_method"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reference = strategy(&server.uri()).create_intent(&request()).await.unwrap();

        assert_eq!(reference.payment_intent_id, "pi_test_123");
        assert_eq!(reference.client_secret, "pi_test_123_secret_xyz");
    }

    #[tokio::test]
    async fn test_create_intent_rejected_by_stripe() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": "Amount must be at least $0.50 usd",
                    "param": "amount"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = strategy(&server.uri()).create_intent(&request()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("Amount must be at least $0.50 usd"));
    }

    #[tokio::test]
    async fn test_create_intent_auth_failure_is_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "type": "invalid_request_error", "message": "Invalid API Key provided" }
            })))
            .mount(&server)
            .await;

        let err = strategy(&server.uri()).create_intent(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn test_create_intent_missing_client_secret() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "pi_x" })))
            .mount(&server)
            .await;

        let err = strategy(&server.uri()).create_intent(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn test_create_intent_network_failure() {
        // nothing listens on port 9 (discard) in the test environment
        let err = strategy("http://127.0.0.1:9")
            .create_intent(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NetworkError(_)));
    }

    #[test]
    fn test_verify_webhook_round_trip() {
        let strategy = strategy("http://localhost");
        let body = serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": Utc::now().timestamp(),
            "data": { "object": {
                "id": "pi_1",
                "amount": 150000,
                "currency": "usd",
                "status": "succeeded",
                "metadata": { "procurement_id": "PO-42" }
            }}
        }))
        .unwrap();
        let sig = signature_header(WEBHOOK_SECRET, Utc::now().timestamp(), &body).unwrap();

        let event = strategy.verify_webhook(&body, &sig).unwrap();
        assert!(matches!(event.kind, EventKind::PaymentSucceeded(_)));
    }

    #[test]
    fn test_verify_webhook_bad_signature_never_parses() {
        let strategy = strategy("http://localhost");
        let err = strategy
            .verify_webhook(b"not even json", "t=1,v1=deadbeef")
            .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookVerificationFailed(_)));
    }
}
