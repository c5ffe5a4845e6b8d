//! # Request Handlers
//!
//! Axum request handlers for the checkout API.
//! Each payment submission runs one orchestrated attempt against the
//! shopper's cart.

use crate::challenge::{
    relay_challenges, AttemptLookup, PendingAttempt, PendingChallenge,
};
use crate::merchant::GraphQlOrderService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use checkout_core::{
    CheckoutError, CheckoutOrchestrator, CheckoutResult, CheckoutState, CustomerIdentity,
    HandleCell, Messages, NextAction, Order, SharedCapture,
};
use checkout_stripe::{CardElement, ElementResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, instrument};

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Request/Response Types
// =============================================================================

/// Payment submission from the embedded form
#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    /// Stripe.js tokenization result for the card form
    pub card: ElementResult,
    /// Shopper identity from the cart
    pub customer: CustomerIdentity,
}

/// Successful payment
#[derive(Debug, Serialize)]
pub struct SubmitPaymentResponse {
    pub order: Order,
}

/// The shopper has to authenticate before the attempt can finish
#[derive(Debug, Serialize)]
pub struct RequiresActionResponse {
    pub status: &'static str,
    /// Ask `GET /api/v1/payments/{attempt_id}` for the result
    pub attempt_id: String,
    pub intent_id: String,
    pub next_action: NextAction,
}

impl RequiresActionResponse {
    fn new(attempt_id: impl Into<String>, challenge: PendingChallenge) -> Self {
        Self {
            status: "requires_action",
            attempt_id: attempt_id.into(),
            intent_id: challenge.intent_id,
            next_action: challenge.next_action,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

fn checkout_error_to_response(err: &CheckoutError, message: String) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(message, code).with_kind(err.kind());
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Response for an attempt that has run to completion
fn finished_attempt(
    joined: Result<CheckoutResult<Order>, JoinError>,
    checkout: &CheckoutState,
    messages: &Messages,
) -> Result<Response, ApiError> {
    let result = joined.map_err(|e| {
        error!("Payment attempt aborted: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Payment attempt aborted", 500)),
        )
    })?;

    match result {
        Ok(order) => {
            info!(order_id = %order.id, "Payment completed");
            Ok(Json(SubmitPaymentResponse { order }).into_response())
        }
        Err(err) => {
            let message = checkout
                .error_message()
                .unwrap_or_else(|| err.user_message(messages));
            Err(checkout_error_to_response(&err, message))
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "card-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Settings the embedded payment form is mounted with
pub async fn payment_config(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stripe = state.stripe.current().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Payment gateway not configured", 503)),
        )
    })?;

    Ok(Json(serde_json::json!({
        "publishable_key": stripe.publishable_key,
        "locale": stripe.locale,
        "elements": stripe.elements,
    })))
}

/// Submit the tokenized card and place the order for a cart.
///
/// Answers 200 with the order, an error status with the shopper message,
/// or 202 with the next action when the shopper has to authenticate first.
#[instrument(skip(state, headers, request), fields(cart_id = %cart_id))]
pub async fn submit_payment(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SubmitPaymentRequest>,
) -> Result<Response, ApiError> {
    if cart_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing cart id", 400)),
        ));
    }

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let card: SharedCapture = Arc::new(CardElement::mounted(request.card));
    let orders = GraphQlOrderService::new(state.http_client.clone(), state.merchant.clone(), &cart_id)
        .with_authorization(authorization);
    let checkout_state = Arc::new(CheckoutState::new());

    let orchestrator = CheckoutOrchestrator::new(
        state.gateway.clone(),
        HandleCell::with(card),
        Arc::new(orders),
        checkout_state.clone(),
    )
    .with_messages(state.messages.clone());

    let (challenges, mut presented) = mpsc::unbounded_channel();
    let customer = request.customer;
    let mut task = tokio::spawn(relay_challenges(challenges, async move {
        orchestrator.attempt_payment(&customer).await
    }));

    tokio::select! {
        biased;
        joined = &mut task => finished_attempt(joined, &checkout_state, &state.messages),
        Some(challenge) = presented.recv() => {
            let attempt_id = state.attempts.insert(PendingAttempt::new(
                challenge.clone(),
                checkout_state,
                task,
            ));
            info!(attempt_id = %attempt_id, "Payment waiting on authentication");
            Ok((
                StatusCode::ACCEPTED,
                Json(RequiresActionResponse::new(attempt_id, challenge)),
            )
                .into_response())
        }
    }
}

/// Result of an attempt that was waiting on authentication
#[instrument(skip(state))]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.attempts.lookup(&attempt_id) {
        AttemptLookup::Unknown => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Unknown payment attempt", 404)),
        )),
        AttemptLookup::Pending(challenge) => Ok((
            StatusCode::ACCEPTED,
            Json(RequiresActionResponse::new(attempt_id, challenge)),
        )
            .into_response()),
        AttemptLookup::Finished(attempt) => {
            let joined = attempt.task.await;
            finished_attempt(joined, &attempt.checkout, &state.messages)
        }
    }
}
