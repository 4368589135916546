//! # Application State
//!
//! Shared state for the Axum application.
//! Built once at startup from an immutable [`AppConfig`]; handlers never
//! read the environment themselves.

use anyhow::Context;
use procurepay_core::{
    BoxedPaymentStrategy, EventStore, LoggingLedger, MemoryEventStore, MerchantProfile,
    RedeliveryPolicy, RedeliveryQueue, RedeliveryWorker, SharedLedger, WebhookDispatcher,
    DEFAULT_EVENT_STORE_CAPACITY,
};
use procurepay_stripe::StripeIntentStrategy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/procurepay.toml";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Merchant defaults applied to every intent
    pub merchant: MerchantProfile,
    /// How many webhook event ids to remember
    pub event_store_capacity: usize,
    /// Retry limits for failed ledger calls
    pub redelivery: RedeliveryPolicy,
}

/// Optional TOML file with merchant settings
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    merchant: MerchantProfile,
}

impl AppConfig {
    /// Load from environment variables (and `.env`, if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config_path = lookup("PROCUREPAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            merchant: load_merchant_profile(&config_path)?,
            event_store_capacity: parse_var(&lookup, "EVENT_STORE_CAPACITY")?
                .unwrap_or(defaults.event_store_capacity),
            redelivery: RedeliveryPolicy {
                max_attempts: parse_var(&lookup, "REDELIVERY_MAX_ATTEMPTS")?
                    .unwrap_or(defaults.redelivery.max_attempts),
                backoff: parse_var(&lookup, "REDELIVERY_BACKOFF_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.redelivery.backoff),
                drain_timeout: parse_var(&lookup, "REDELIVERY_DRAIN_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.redelivery.drain_timeout),
            },
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            merchant: MerchantProfile::default(),
            event_store_capacity: DEFAULT_EVENT_STORE_CAPACITY,
            redelivery: RedeliveryPolicy::default(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
        })
        .transpose()
}

/// Load merchant settings; a missing file means defaults.
fn load_merchant_profile(path: &Path) -> anyhow::Result<MerchantProfile> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let file: ConfigFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            tracing::info!("Loaded merchant profile from {}", path.display());
            Ok(file.merchant)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(MerchantProfile::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment provider
    pub strategy: BoxedPaymentStrategy,
    /// Webhook event router
    pub dispatcher: Arc<WebhookDispatcher>,
    /// Application config
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Assemble state from explicit collaborators.
    ///
    /// The returned worker must be spawned for queued ledger retries to run.
    pub fn new(
        config: AppConfig,
        strategy: BoxedPaymentStrategy,
        ledger: SharedLedger,
        store: Arc<dyn EventStore>,
    ) -> (Self, RedeliveryWorker) {
        let (redelivery, worker) = RedeliveryQueue::new(ledger.clone(), config.redelivery);
        let dispatcher = WebhookDispatcher::new(ledger, store, redelivery);

        (
            Self {
                strategy,
                dispatcher: Arc::new(dispatcher),
                config: Arc::new(config),
            },
            worker,
        )
    }

    /// Build production state: Stripe, logging ledger, in-memory event store
    pub fn from_env() -> anyhow::Result<(Self, RedeliveryWorker)> {
        let config = AppConfig::from_env()?;

        let strategy = StripeIntentStrategy::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        if strategy.config().is_live_mode() {
            tracing::info!("Stripe running in LIVE mode");
        }

        let store = Arc::new(MemoryEventStore::new(config.event_store_capacity));

        Ok(Self::new(
            config,
            Arc::new(strategy),
            Arc::new(LoggingLedger),
            store,
        ))
    }

    pub fn merchant(&self) -> &MerchantProfile {
        &self.config.merchant
    }
}
