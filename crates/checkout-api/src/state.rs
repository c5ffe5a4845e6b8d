//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the gateway handle, storefront settings and message catalogue.

use crate::challenge::{PendingAttempts, RelayChallengePresenter};
use crate::merchant::MerchantConfig;
use checkout_core::{
    GatewayClient, HandleCell, Messages, ServiceResult, SharedGateway, TranslationTable,
};
use checkout_stripe::{StripeConfig, StripeGatewayClient};
use std::sync::Arc;
use tracing::info;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Storefront GraphQL endpoint
    pub merchant_graphql_url: String,
    /// Payment method code on the storefront
    pub merchant_payment_code: String,
    /// Store view sent as the `Store` header
    pub merchant_store_code: Option<String>,
    /// Translation file for shopper-facing messages
    pub messages_path: String,
    /// Env file re-read on reload
    pub env_file: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            merchant_graphql_url: std::env::var("MERCHANT_GRAPHQL_URL")
                .unwrap_or_else(|_| "http://localhost/graphql".to_string()),
            merchant_payment_code: std::env::var("MERCHANT_PAYMENT_CODE")
                .unwrap_or_else(|_| "stripe_payments".to_string()),
            merchant_store_code: std::env::var("MERCHANT_STORE_CODE")
                .ok()
                .filter(|s| !s.is_empty()),
            messages_path: std::env::var("MESSAGES_PATH")
                .unwrap_or_else(|_| "config/messages.toml".to_string()),
            env_file: std::env::var("ENV_FILE").unwrap_or_else(|_| ".env".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Storefront settings derived from this config
    pub fn merchant(&self) -> MerchantConfig {
        let mut merchant = MerchantConfig::new(&self.merchant_graphql_url);
        merchant.payment_method_code = self.merchant_payment_code.clone();
        merchant.store_code = self.merchant_store_code.clone();
        merchant
    }
}

/// Stripe client that hands pending authentication back to the shopper
fn stripe_gateway(config: StripeConfig) -> ServiceResult<SharedGateway> {
    let client = StripeGatewayClient::new(config)?
        .with_challenge_presenter(Arc::new(RelayChallengePresenter));
    Ok(Arc::new(client))
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Stripe settings served to the embedded form; replaced on reload
    pub stripe: HandleCell<StripeConfig>,
    /// Current gateway client; replaced on reload
    pub gateway: HandleCell<dyn GatewayClient>,
    /// Storefront settings
    pub merchant: MerchantConfig,
    /// Shopper-facing message catalogue
    pub messages: Messages,
    /// Attempts waiting on shopper authentication
    pub attempts: PendingAttempts,
    /// HTTP client for storefront calls
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Create a new AppState with the Stripe gateway
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let stripe = StripeConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load Stripe config: {}", e))?;
        let gateway = stripe_gateway(stripe.clone())
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let translations = TranslationTable::load(&config.messages_path)
            .map_err(|e| anyhow::anyhow!("Failed to load messages: {}", e))?;
        info!(
            "Loaded {} message translations from {}",
            translations.len(),
            config.messages_path
        );

        Ok(Self::from_parts(
            config,
            stripe,
            gateway,
            Messages::new(Arc::new(translations)),
        ))
    }

    /// Assemble state from explicit parts (tests, embedding)
    pub fn from_parts(
        config: AppConfig,
        stripe: StripeConfig,
        gateway: Arc<dyn GatewayClient>,
        messages: Messages,
    ) -> Self {
        let merchant = config.merchant();
        Self {
            config,
            stripe: HandleCell::with(Arc::new(stripe)),
            gateway: HandleCell::with(gateway),
            merchant,
            messages,
            attempts: PendingAttempts::new(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Re-read Stripe settings from the env file and swap the gateway.
    /// Attempts already running keep the client they started with.
    pub fn reload_gateway(&self) -> ServiceResult<()> {
        let stripe = StripeConfig::reload_from_file(&self.config.env_file)?;
        let gateway = stripe_gateway(stripe.clone())?;
        self.replace_gateway(stripe, gateway);
        Ok(())
    }

    /// Swap in a new gateway client
    pub fn replace_gateway(&self, stripe: StripeConfig, gateway: Arc<dyn GatewayClient>) {
        info!(provider = gateway.provider_name(), "Gateway client replaced");
        self.stripe.set(Arc::new(stripe));
        self.gateway.set(gateway);
    }
}
