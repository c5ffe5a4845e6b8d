//! # Checkout Types
//!
//! Values passed between the orchestrator and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shopper identity captured at submission time.
/// Sent to the gateway as billing details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub full_name: String,
    pub email: String,
}

impl CustomerIdentity {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
        }
    }
}

/// An error message reported by the gateway or the capture widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl GatewayMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of finalizing the capture widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Input is complete and frozen for tokenization
    Ready,
    /// Widget rejected its input
    Invalid(GatewayMessage),
}

/// Opaque payment method data handed from the capture widget to the gateway
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PaymentMethodData {
    /// Gateway payment method type (e.g., "card")
    pub method_type: String,
    /// Form fields in gateway notation
    pub fields: BTreeMap<String, String>,
}

impl PaymentMethodData {
    pub fn new(method_type: impl Into<String>) -> Self {
        Self {
            method_type: method_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

// Field values are card data; only keys are printable.
impl fmt::Debug for PaymentMethodData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentMethodData")
            .field("method_type", &self.method_type)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Gateway id of a tokenized payment method. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PaymentMethodReference(String);

impl PaymentMethodReference {
    /// Returns `None` for an empty id
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tokenization reply. `error` and `payment_method_id` are read independently:
/// a reply can carry neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMethodResponse {
    pub payment_method_id: Option<String>,
    pub error: Option<GatewayMessage>,
}

impl PaymentMethodResponse {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            payment_method_id: Some(id.into()),
            error: None,
        }
    }

    pub fn rejected(error: GatewayMessage) -> Self {
        Self {
            payment_method_id: None,
            error: Some(error),
        }
    }

    /// The usable reference, if any
    pub fn reference(&self) -> Option<PaymentMethodReference> {
        self.payment_method_id
            .clone()
            .and_then(PaymentMethodReference::new)
    }
}

/// Client secret tying a payment attempt to the gateway
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Payment intent id encoded in the secret (`pi_123_secret_abc` -> `pi_123`)
    pub fn intent_id(&self) -> &str {
        self.0
            .split_once("_secret_")
            .map(|(id, _)| id)
            .unwrap_or(&self.0)
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationToken({}_secret_***)", self.intent_id())
    }
}

/// A placed order as recorded in cart/session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Merchant order number
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Grand total in the smallest currency unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// When the order service answered
    pub placed_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            amount: None,
            currency: None,
            placed_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_total(mut self, amount: i64, currency: impl Into<String>) -> Self {
        self.amount = Some(amount);
        self.currency = Some(currency.into());
        self
    }
}

/// What the order service returns from a successful placement call
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order: Order,
    pub continuation: Option<ContinuationToken>,
}

impl PlacedOrder {
    pub fn completed(order: Order) -> Self {
        Self {
            order,
            continuation: None,
        }
    }

    pub fn pending(order: Order, token: ContinuationToken) -> Self {
        Self {
            order,
            continuation: Some(token),
        }
    }

    pub fn outcome(self) -> OrderResult {
        match self.continuation {
            Some(token) => OrderResult::PendingAuthentication {
                order: self.order,
                token,
            },
            None => OrderResult::Completed(self.order),
        }
    }
}

/// Placement outcome
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResult {
    Completed(Order),
    PendingAuthentication {
        order: Order,
        token: ContinuationToken,
    },
}

/// Step-up action demanded by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    /// Action type (e.g., "redirect_to_url", "use_stripe_sdk")
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Gateway-side state of a payment attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

impl PaymentIntent {
    pub fn requires_action(&self) -> bool {
        self.next_action.is_some()
    }
}

/// Result of resolving a pending authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Resolved,
    Failed(GatewayMessage),
}
