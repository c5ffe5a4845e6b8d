//! # Stripe Gateway Client
//!
//! `GatewayClient` implementation against the Stripe REST API using the
//! publishable key: payment method creation, payment intent retrieval by
//! client secret, and resolution of pending authentication.

use crate::config::StripeConfig;
use async_trait::async_trait;
use checkout_core::{
    CaptureSession, ChallengeOutcome, ContinuationToken, CustomerIdentity, GatewayClient,
    GatewayMessage, NextAction, PaymentIntent, PaymentMethodResponse, ServiceError,
    ServiceResult,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const PROVIDER: &str = "stripe";

/// Intent statuses that mean the shopper has nothing left to do
const SETTLED_STATUSES: [&str; 3] = ["succeeded", "processing", "requires_capture"];

/// Shows a pending authentication to the shopper
#[async_trait]
pub trait ChallengePresenter: Send + Sync {
    async fn present(&self, intent_id: &str, action: &NextAction) -> Result<(), GatewayMessage>;
}

/// Logs where the shopper has to go to authenticate.
/// Nothing reaches the shopper; hosts that serve shoppers install their own.
#[derive(Debug, Default)]
pub struct LoggingChallengePresenter;

#[async_trait]
impl ChallengePresenter for LoggingChallengePresenter {
    async fn present(&self, intent_id: &str, action: &NextAction) -> Result<(), GatewayMessage> {
        match &action.redirect_url {
            Some(url) => info!(intent = intent_id, url = %url, "Authentication redirect pending"),
            None => info!(intent = intent_id, kind = %action.kind, "Authentication pending"),
        }
        Ok(())
    }
}

/// Stripe-backed gateway client
pub struct StripeGatewayClient {
    config: StripeConfig,
    client: Client,
    presenter: Arc<dyn ChallengePresenter>,
}

impl StripeGatewayClient {
    /// Create a new client
    pub fn new(config: StripeConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            presenter: Arc::new(LoggingChallengePresenter),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> ServiceResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// Builder: set how pending authentication is shown to the shopper
    pub fn with_challenge_presenter(mut self, presenter: Arc<dyn ChallengePresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version);
        match &self.config.locale {
            Some(locale) => request.header("Accept-Language", locale),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ServiceResult<(u16, String)> {
        let response: Response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    async fn fetch_intent(&self, token: &ContinuationToken) -> ServiceResult<StripeIntent> {
        let url = self.url(&format!("/v1/payment_intents/{}", token.intent_id()));
        let request = self
            .authorize(self.client.get(&url))
            .query(&[("client_secret", token.secret())]);

        let (status, body) = self.send(request).await?;
        if !(200..300).contains(&status) {
            error!("Stripe API error: status={}", status);
            return Err(ServiceError::Gateway {
                provider: PROVIDER.to_string(),
                status,
                message: parse_error(&body)
                    .map(|e| e.message)
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ServiceError::Protocol(format!("Failed to parse Stripe payment intent: {}", e))
        })
    }
}

#[async_trait]
impl GatewayClient for StripeGatewayClient {
    #[instrument(skip_all)]
    async fn create_payment_method(
        &self,
        capture: &dyn CaptureSession,
        billing: &CustomerIdentity,
    ) -> ServiceResult<PaymentMethodResponse> {
        let data = capture.payment_method_data()?;

        let mut form_params: Vec<(String, String)> = vec![
            ("type".to_string(), data.method_type.clone()),
            ("billing_details[name]".to_string(), billing.full_name.clone()),
            ("billing_details[email]".to_string(), billing.email.clone()),
        ];
        form_params.extend(data.fields.into_iter());

        let request = self
            .authorize(self.client.post(self.url("/v1/payment_methods")))
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .form(&form_params);

        let (status, body) = self.send(request).await?;

        if !(200..300).contains(&status) {
            // Only a Stripe error object is shown to the shopper
            let Some(error) = parse_error(&body) else {
                error!("Stripe API error without error body: status={}", status);
                return Err(ServiceError::Gateway {
                    provider: PROVIDER.to_string(),
                    status,
                    message: format!("HTTP {}", status),
                });
            };
            warn!("Stripe rejected payment method: status={}", status);
            return Ok(PaymentMethodResponse::rejected(error));
        }

        // Read leniently: a body without an id is reported, not a parse failure
        let value: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        let payment_method_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from);

        debug!(found = payment_method_id.is_some(), "Stripe payment method response");

        Ok(PaymentMethodResponse {
            payment_method_id,
            error: None,
        })
    }

    #[instrument(skip_all, fields(intent = %token.intent_id()))]
    async fn retrieve_intent(&self, token: &ContinuationToken) -> ServiceResult<PaymentIntent> {
        let intent = self.fetch_intent(token).await?;
        debug!(status = %intent.status, "Retrieved payment intent");
        Ok(intent.into_intent())
    }

    #[instrument(skip_all, fields(intent = %token.intent_id()))]
    async fn resolve_challenge(
        &self,
        token: &ContinuationToken,
    ) -> ServiceResult<ChallengeOutcome> {
        let intent = self.fetch_intent(token).await?;
        let Some(action) = intent.next_action() else {
            return Ok(intent.outcome());
        };

        if let Err(message) = self.presenter.present(&intent.id, &action).await {
            return Ok(ChallengeOutcome::Failed(message));
        }

        let deadline = Instant::now() + self.config.challenge_timeout;
        loop {
            sleep(self.config.challenge_poll_interval).await;

            let intent = self.fetch_intent(token).await?;
            if intent.status != "requires_action" {
                debug!(status = %intent.status, "Authentication finished");
                return Ok(intent.outcome());
            }
            if Instant::now() >= deadline {
                warn!("Authentication timed out");
                return Ok(ChallengeOutcome::Failed(
                    GatewayMessage::new("Authentication was not completed in time.")
                        .with_code("authentication_timeout"),
                ));
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    status: String,
    #[serde(default)]
    next_action: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    last_payment_error: Option<StripeError>,
}

impl StripeIntent {
    fn next_action(&self) -> Option<NextAction> {
        let raw = self.next_action.as_ref()?;
        let kind = raw
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        // redirect_to_url.url, or the 3DS2 fallback under use_stripe_sdk
        let redirect_url = raw
            .get("redirect_to_url")
            .and_then(|r| r.get("url"))
            .or_else(|| raw.get("use_stripe_sdk").and_then(|s| s.get("stripe_js")))
            .and_then(|v| v.as_str())
            .map(String::from);
        Some(NextAction { kind, redirect_url })
    }

    fn outcome(&self) -> ChallengeOutcome {
        if SETTLED_STATUSES.contains(&self.status.as_str()) {
            return ChallengeOutcome::Resolved;
        }
        let message = match &self.last_payment_error {
            Some(err) => err.to_message(),
            None => GatewayMessage::new(format!(
                "Payment authentication failed (status: {}).",
                self.status
            ))
            .with_code("payment_intent_authentication_failure"),
        };
        ChallengeOutcome::Failed(message)
    }

    fn into_intent(self) -> PaymentIntent {
        let next_action = self.next_action();
        PaymentIntent {
            id: self.id,
            status: self.status,
            next_action,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl StripeError {
    fn to_message(&self) -> GatewayMessage {
        GatewayMessage {
            message: self
                .message
                .clone()
                .unwrap_or_else(|| "Your payment could not be processed.".to_string()),
            code: self.code.clone(),
        }
    }
}

fn parse_error(body: &str) -> Option<GatewayMessage> {
    serde_json::from_str::<StripeErrorResponse>(body)
        .ok()
        .map(|r| r.error.to_message())
}
