//! # checkout-stripe
//!
//! Stripe collaborators for card-checkout-rs.
//!
//! This crate provides:
//!
//! 1. **StripeGatewayClient** - `GatewayClient` over the Stripe REST API
//!    - Payment method creation from a finalized card element
//!    - Payment intent retrieval by client secret
//!    - Step-up authentication through a `ChallengePresenter`
//!
//! 2. **CardElement** - `CaptureSession` for the embedded card form
//!    - Takes the Stripe.js card token (or form error), never card numbers
//!    - Frozen token for payment method creation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_stripe::{CardElement, StripeGatewayClient};
//! use checkout_core::{CheckoutOrchestrator, HandleCell};
//!
//! let gateway = HandleCell::with(Arc::new(StripeGatewayClient::from_env()?) as SharedGateway);
//! let capture = HandleCell::with(Arc::new(CardElement::mounted(result)) as SharedCapture);
//!
//! let orchestrator = CheckoutOrchestrator::new(gateway, capture, orders, sink);
//! let order = orchestrator.attempt_payment(&customer).await?;
//! ```

pub mod card;
pub mod client;
pub mod config;

// Re-exports
pub use card::{CardElement, CardSummary, CardToken, ElementResult};
pub use client::{ChallengePresenter, LoggingChallengePresenter, StripeGatewayClient};
pub use config::{ElementsOptions, StripeConfig};
