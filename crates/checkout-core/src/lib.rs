//! # checkout-core
//!
//! Core types, collaborator traits and the payment orchestrator for
//! card-checkout-rs.
//!
//! This crate provides:
//! - `CheckoutOrchestrator` which drives one payment attempt end to end
//! - `GatewayClient`, `CaptureSession`, `OrderService`, `PresentationSink`
//!   traits for the collaborators it coordinates
//! - `HandleCell` for gateway/widget handles that get replaced at runtime
//! - `CheckoutState`, an in-memory presentation sink
//! - `CheckoutError` / `ServiceError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutOrchestrator, CheckoutState, CustomerIdentity, HandleCell};
//!
//! let gateway = HandleCell::with(stripe_client);
//! let capture = HandleCell::with(card_element);
//! let state = Arc::new(CheckoutState::new());
//!
//! let orchestrator = CheckoutOrchestrator::new(gateway, capture, order_service, state.clone());
//!
//! match orchestrator.attempt_payment(&CustomerIdentity::new("Ada", "ada@example.com")).await {
//!     Ok(order) => println!("placed {}", order.id),
//!     Err(_) => println!("{}", state.error_message().unwrap_or_default()),
//! }
//! ```

pub mod collaborators;
pub mod error;
pub mod handle;
pub mod messages;
pub mod model;
pub mod orchestrator;
pub mod session;

// Re-exports for convenience
pub use collaborators::{
    CaptureSession, GatewayClient, OrderService, PresentationSink, SharedCapture, SharedGateway,
    SharedOrderService, SharedSink,
};
pub use error::{CheckoutError, CheckoutResult, ServiceError, ServiceResult};
pub use handle::HandleCell;
pub use messages::{IdentityTranslator, Message, Messages, TranslationTable, Translator};
pub use model::{
    ChallengeOutcome, ContinuationToken, CustomerIdentity, GatewayMessage, NextAction, Order,
    OrderResult, PaymentIntent, PaymentMethodData, PaymentMethodReference, PaymentMethodResponse,
    PlacedOrder, Submission,
};
pub use orchestrator::{orchestrator_for, CheckoutOrchestrator};
pub use session::CheckoutState;
