//! # Checkout Error Types
//!
//! Typed error handling for the card checkout engine.
//!
//! Two layers:
//! - `ServiceError` is what a collaborator (gateway, order service, capture
//!   widget) returns when a call fails outright: transport, protocol, HTTP.
//! - `CheckoutError` is the outcome of one payment attempt. Every variant but
//!   `Unexpected` is detected by the orchestrator itself; `Unexpected` wraps
//!   the first `ServiceError` that escaped a step.

use crate::messages::{Message, Messages};
use crate::model::GatewayMessage;
use thiserror::Error;

/// Failure raised by a collaborator call
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network/HTTP error communicating with a collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    /// Gateway answered with a non-success status outside of a reported error
    #[error("Gateway error [{provider}] (HTTP {status}): {message}")]
    Gateway {
        provider: String,
        status: u16,
        message: String,
    },

    /// Order service rejected the request or answered with GraphQL errors
    #[error("Order service error: {0}")]
    OrderService(String),

    /// Response could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capture data requested before the capture session was finalized
    #[error("Capture session has not been finalized")]
    NotFinalized,
}

/// Outcome of a failed payment attempt
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Gateway client or capture widget is not initialized
    #[error("Payment collaborators are not ready")]
    NotReady,

    /// Capture widget rejected its own input
    #[error("Card details invalid: {message}")]
    CaptureInvalid { message: String },

    /// Gateway reported an error while creating the payment method
    #[error("Tokenization failed: {message}")]
    TokenizationFailed { message: String },

    /// Gateway call succeeded but produced no payment method id
    #[error("Tokenization response carried no payment method")]
    TokenizationMalformed,

    /// Order service returned no order
    #[error("Order placement returned no order")]
    PlacementFailed,

    /// Step-up authentication was rejected or errored
    #[error("Authentication challenge failed: {detail}")]
    ChallengeFailed { detail: GatewayMessage },

    /// Any collaborator failure that escaped a step
    #[error("Unexpected failure: {0}")]
    Unexpected(#[from] ServiceError),
}

impl CheckoutError {
    /// Stable tag for this failure kind (logging, API payloads)
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::NotReady => "not_ready",
            CheckoutError::CaptureInvalid { .. } => "capture_invalid",
            CheckoutError::TokenizationFailed { .. } => "tokenization_failed",
            CheckoutError::TokenizationMalformed => "tokenization_malformed",
            CheckoutError::PlacementFailed => "placement_failed",
            CheckoutError::ChallengeFailed { .. } => "challenge_failed",
            CheckoutError::Unexpected(_) => "unexpected",
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::NotReady => 503,
            CheckoutError::CaptureInvalid { .. } => 422,
            CheckoutError::TokenizationFailed { .. } => 402,
            CheckoutError::TokenizationMalformed => 502,
            CheckoutError::PlacementFailed => 502,
            CheckoutError::ChallengeFailed { .. } => 402,
            CheckoutError::Unexpected(_) => 502,
        }
    }

    /// The one message shown to the shopper for this failure.
    ///
    /// Widget and gateway messages are passed through verbatim; everything
    /// else goes through the catalogue.
    pub fn user_message(&self, messages: &Messages) -> String {
        match self {
            CheckoutError::NotReady => messages.text(Message::NotReady),
            CheckoutError::CaptureInvalid { message } => message.clone(),
            CheckoutError::TokenizationFailed { message } => message.clone(),
            CheckoutError::TokenizationMalformed => {
                messages.text(Message::PaymentMethodCreationFailed)
            }
            CheckoutError::PlacementFailed => messages.text(Message::OrderCreationFailed),
            CheckoutError::ChallengeFailed { .. } => {
                messages.text(Message::TransactionNotFinalized)
            }
            CheckoutError::Unexpected(_) => messages.text(Message::TransactionNotPerformed),
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Result type alias for collaborator calls
pub type ServiceResult<T> = Result<T, ServiceError>;
