//! # Stripe Configuration
//!
//! Configuration management for Stripe integration.
//! Secrets are loaded once from environment variables and never logged.

use crate::signature::DEFAULT_TOLERANCE_SECS;
use procurepay_core::PaymentError;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
pub const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Stripe API configuration
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    /// Maximum age of a webhook signature timestamp, in seconds
    pub webhook_tolerance_secs: i64,

    /// Timeout for outbound API calls
    pub request_timeout: Duration,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    /// - `STRIPE_WEBHOOK_SECRET`
    ///
    /// Optional:
    /// - `STRIPE_API_BASE_URL`
    /// - `STRIPE_WEBHOOK_TOLERANCE_SECS`
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, PaymentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("STRIPE_SECRET_KEY").ok_or_else(|| {
            PaymentError::Configuration("STRIPE_SECRET_KEY not set".to_string())
        })?;

        let webhook_secret = lookup("STRIPE_WEBHOOK_SECRET").ok_or_else(|| {
            PaymentError::Configuration("STRIPE_WEBHOOK_SECRET not set".to_string())
        })?;

        // Validate key formats
        if !secret_key.starts_with("sk_test_") && !secret_key.starts_with("sk_live_") {
            return Err(PaymentError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }

        if !webhook_secret.starts_with("whsec_") {
            return Err(PaymentError::Configuration(
                "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
            ));
        }

        let mut config = Self::new(secret_key, webhook_secret);

        if let Some(url) = lookup("STRIPE_API_BASE_URL") {
            config = config.with_api_base_url(url);
        }

        if let Some(raw) = lookup("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            let secs = raw.parse::<i64>().map_err(|_| {
                PaymentError::Configuration(format!(
                    "STRIPE_WEBHOOK_TOLERANCE_SECS must be an integer, got {:?}",
                    raw
                ))
            })?;
            config.webhook_tolerance_secs = secs;
        }

        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Check if using live keys
    pub fn is_live_mode(&self) -> bool {
        self.secret_key.starts_with("sk_live_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_live_mode() { "live" } else { "test" };
        f.debug_struct("StripeConfig")
            .field("secret_key", &format_args!("sk_{}_[redacted]", mode))
            .field("webhook_secret", &"whsec_[redacted]")
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
