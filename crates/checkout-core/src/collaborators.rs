//! # Collaborator Traits
//!
//! The orchestrator talks to four collaborators, each behind a trait so the
//! provider, merchant backend, and UI layer can be swapped independently.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    CheckoutOrchestrator                      │
//! └──────┬───────────────┬────────────────┬───────────────┬──────┘
//!        │               │                │               │
//!  ┌─────┴──────┐ ┌──────┴──────┐ ┌───────┴──────┐ ┌──────┴──────┐
//!  │  Capture   │ │   Gateway   │ │    Order     │ │Presentation │
//!  │  Session   │ │   Client    │ │   Service    │ │    Sink     │
//!  └────────────┘ └─────────────┘ └──────────────┘ └─────────────┘
//! ```
//!
//! Logical outcomes (validation errors, declined tokenization, missing
//! order) come back as values. `Err(ServiceError)` is reserved for calls
//! that failed outright.

use crate::error::ServiceResult;
use crate::model::{
    ChallengeOutcome, ContinuationToken, CustomerIdentity, Order, PaymentIntent,
    PaymentMethodData, PaymentMethodReference, PaymentMethodResponse, PlacedOrder, Submission,
};
use async_trait::async_trait;
use std::sync::Arc;

/// The embedded card form's input state
#[async_trait]
pub trait CaptureSession: Send + Sync {
    /// Whether the widget is mounted and can be submitted
    fn is_ready(&self) -> bool;

    /// Validate and freeze the current input.
    async fn finalize(&self) -> ServiceResult<Submission>;

    /// Frozen input in gateway notation. Fails before `finalize` succeeds.
    fn payment_method_data(&self) -> ServiceResult<PaymentMethodData>;
}

/// Payment gateway client (tokenization and authentication)
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Tokenize the finalized capture session.
    ///
    /// # Arguments
    /// * `capture` - A capture session that has been finalized
    /// * `billing` - Shopper identity sent as billing details
    async fn create_payment_method(
        &self,
        capture: &dyn CaptureSession,
        billing: &CustomerIdentity,
    ) -> ServiceResult<PaymentMethodResponse>;

    /// Fetch the current state of the payment attempt behind a token.
    async fn retrieve_intent(&self, token: &ContinuationToken) -> ServiceResult<PaymentIntent>;

    /// Drive a pending step-up authentication to completion.
    async fn resolve_challenge(&self, token: &ContinuationToken)
        -> ServiceResult<ChallengeOutcome>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Merchant order service bound to the shopper's current cart
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Associate a payment method with the in-progress order.
    async fn set_payment_method(&self, reference: &PaymentMethodReference) -> ServiceResult<()>;

    /// Finalize the order. `None` means the service produced no order.
    async fn place_order(&self) -> ServiceResult<Option<PlacedOrder>>;
}

/// Where shopper-visible results go
pub trait PresentationSink: Send + Sync {
    fn report_error(&self, message: String);

    fn record_order(&self, order: &Order);
}

pub type SharedGateway = Arc<dyn GatewayClient>;
pub type SharedCapture = Arc<dyn CaptureSession>;
pub type SharedOrderService = Arc<dyn OrderService>;
pub type SharedSink = Arc<dyn PresentationSink>;
