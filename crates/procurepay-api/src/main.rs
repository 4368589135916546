//! # procurepay
//!
//! Procurement payment backend on top of Stripe PaymentIntents.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//!
//! # Run the server (LOG_FORMAT=json for structured logs)
//! procurepay
//! ```

use procurepay_api::{routes, state::AppState};
use procurepay_stripe::REQUIRED_WEBHOOK_EVENTS;
use tokio::sync::oneshot;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (state, redelivery_worker) = AppState::from_env()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Merchant: {}", state.merchant().company);
    info!("Payment provider: {}", state.strategy.provider_name());

    let (stopped_tx, stopped_rx) = oneshot::channel::<()>();
    let redelivery = tokio::spawn(redelivery_worker.run_until(async move {
        let _ = stopped_rx.await;
    }));

    let app = routes::create_router(state);

    info!("procurepay starting on http://{}", addr);

    if !is_prod {
        info!("Checkout: POST http://{}{}", addr, routes::CREATE_INTENT_PATH);
        info!("Webhook:  POST http://{}{}", addr, routes::STRIPE_WEBHOOK_PATH);
        info!("Webhook events to enable: {}", REQUIRED_WEBHOOK_EVENTS.join(", "));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Pending retries get the configured drain window, then are abandoned
    let _ = stopped_tx.send(());
    redelivery.await?;
    info!("procurepay stopped");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
