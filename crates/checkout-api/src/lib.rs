//! # checkout-api
//!
//! HTTP API layer for card-checkout-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Payment submission endpoint running the checkout orchestrator
//! - GraphQL storefront client implementing `OrderService`
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/payment/config` | Embedded form settings |
//! | POST | `/api/v1/carts/{cart_id}/payment` | Pay and place the order |
//! | GET | `/api/v1/payments/{attempt_id}` | Result of an attempt waiting on authentication |

pub mod challenge;
pub mod handlers;
pub mod merchant;
pub mod routes;
pub mod state;

pub use challenge::{PendingAttempts, RelayChallengePresenter};
pub use merchant::{GraphQlOrderService, MerchantConfig};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
