//! # Card Checkout RS
//!
//! Embedded card checkout backend.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export MERCHANT_GRAPHQL_URL=https://shop.example.com/graphql
//!
//! # Run the server
//! card-checkout
//! ```
//!
//! Send SIGHUP to re-read the Stripe settings from `.env` (or `ENV_FILE`)
//! without a restart.

use checkout_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Storefront: {}", state.merchant.graphql_url);
    if let Some(gateway) = state.gateway.current() {
        info!("Payment gateway: {}", gateway.provider_name());
    }

    #[cfg(unix)]
    spawn_reload_on_sighup(state.clone())?;

    let app = routes::create_router(state);

    info!("Card checkout starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Form config: GET http://{}/api/v1/payment/config", addr);
        info!("Payment: POST http://{}/api/v1/carts/{{cart_id}}/payment", addr);
        info!("Attempt result: GET http://{}/api/v1/payments/{{attempt_id}}", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_sighup(state: AppState) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match state.reload_gateway() {
                Ok(()) => info!("Stripe settings reloaded"),
                Err(e) => tracing::error!("Stripe reload failed, keeping current client: {}", e),
            }
        }
    });
    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Card Checkout RS
  ━━━━━━━━━━━━━━━━━━━━━━━
  Embedded card payments
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
