//! # Payment Intent Types
//!
//! Checkout input, the validated intent request sent to a provider,
//! and the reference a provider hands back.

use crate::error::{PaymentError, PaymentResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every intent is charged in US dollars.
pub const CURRENCY: &str = "usd";

/// Largest amount the processor accepts for a single USD charge, in cents.
pub const MAX_AMOUNT: i64 = 99_999_999;

/// Processor limit on a single metadata value.
pub const MAX_METADATA_VALUE_LEN: usize = 500;

/// Metadata key carrying the procurement correlation id.
pub const PROCUREMENT_ID_KEY: &str = "procurement_id";

/// When funds are captured after authorization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    /// Capture immediately on confirmation
    #[default]
    Automatic,
    /// Authorize only, capture later (procurement holds)
    Manual,
}

impl CaptureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMethod::Automatic => "automatic",
            CaptureMethod::Manual => "manual",
        }
    }
}

/// Whether the payment method is saved for later charges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupFutureUsage {
    OffSession,
    OnSession,
}

impl SetupFutureUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupFutureUsage::OffSession => "off_session",
            SetupFutureUsage::OnSession => "on_session",
        }
    }
}

/// Merchant-wide settings applied to every intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantProfile {
    /// Company name written into intent metadata
    pub company: String,
    /// Description used when the buyer does not supply one
    pub default_description: String,
    pub capture_method: CaptureMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_future_usage: Option<SetupFutureUsage>,
}

impl Default for MerchantProfile {
    fn default() -> Self {
        Self {
            company: "SABERDOG LLC".to_string(),
            default_description: "SABERDOG LLC Procurement Payment".to_string(),
            capture_method: CaptureMethod::Automatic,
            setup_future_usage: None,
        }
    }
}

/// Checkout request as received from an untrusted client.
///
/// Every field is optional at this stage so that a missing value is
/// reported as a validation error rather than a body parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Amount in cents, e.g. 150000 = $1,500.00
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub procurement_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CheckoutRequest {
    pub fn new(amount: i64, procurement_id: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            procurement_id: Some(procurement_id.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A validated request ready to be sent to a payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Amount in cents, always in `1..=MAX_AMOUNT`
    pub amount: i64,
    pub currency: &'static str,
    pub procurement_id: String,
    pub description: String,
    pub capture_method: CaptureMethod,
    pub setup_future_usage: Option<SetupFutureUsage>,
    /// Opaque key/value pairs echoed back in webhook events
    pub metadata: BTreeMap<String, String>,
}

impl IntentRequest {
    /// Validate a checkout request and apply merchant defaults.
    pub fn from_checkout(
        checkout: CheckoutRequest,
        merchant: &MerchantProfile,
    ) -> PaymentResult<Self> {
        let amount = checkout
            .amount
            .ok_or_else(|| PaymentError::InvalidRequest("amount is required".to_string()))?;

        if amount <= 0 {
            return Err(PaymentError::InvalidRequest(format!(
                "amount must be a positive number of cents, got {}",
                amount
            )));
        }

        if amount > MAX_AMOUNT {
            return Err(PaymentError::InvalidRequest(format!(
                "amount must not exceed {} cents, got {}",
                MAX_AMOUNT, amount
            )));
        }

        // Forwarded unchanged; webhooks are matched on it
        let procurement_id = checkout
            .procurement_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                PaymentError::InvalidRequest("procurementId is required".to_string())
            })?;

        if procurement_id.chars().count() > MAX_METADATA_VALUE_LEN {
            return Err(PaymentError::InvalidRequest(format!(
                "procurementId must be at most {} characters",
                MAX_METADATA_VALUE_LEN
            )));
        }

        let description = checkout
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| merchant.default_description.clone());

        if description.chars().count() > MAX_METADATA_VALUE_LEN {
            return Err(PaymentError::InvalidRequest(format!(
                "description must be at most {} characters",
                MAX_METADATA_VALUE_LEN
            )));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(PROCUREMENT_ID_KEY.to_string(), procurement_id.clone());
        metadata.insert("company".to_string(), merchant.company.clone());
        metadata.insert("description".to_string(), description.clone());

        Ok(Self {
            amount,
            currency: CURRENCY,
            procurement_id,
            description,
            capture_method: merchant.capture_method,
            setup_future_usage: merchant.setup_future_usage,
            metadata,
        })
    }
}

/// Opaque handle to an intent held by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentReference {
    /// One-time token the browser uses to confirm the payment
    pub client_secret: String,
    pub payment_intent_id: String,
}
