//! # Card Element
//!
//! Capture-session adapter for the embedded card form. Card data never
//! leaves Stripe.js: the browser tokenizes the form and forwards only the
//! `{ token }` or `{ error }` result. `finalize` checks what arrived and
//! freezes the token for payment method creation.

use async_trait::async_trait;
use checkout_core::{
    CaptureSession, GatewayMessage, PaymentMethodData, ServiceError, ServiceResult, Submission,
};
use serde::Deserialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const TOKEN_PREFIX: &str = "tok_";

/// Card token created by Stripe.js
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardToken {
    pub id: String,
    #[serde(default)]
    pub card: Option<CardSummary>,
}

/// Display details Stripe attaches to a card token
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardSummary {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
}

/// What the card form produced in the browser.
///
/// Only the tokenization result is accepted; raw card fields are refused
/// at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementResult {
    #[serde(default)]
    pub token: Option<CardToken>,
    /// Validation error reported by the form
    #[serde(default)]
    pub error: Option<GatewayMessage>,
}

impl ElementResult {
    pub fn tokenized(id: impl Into<String>) -> Self {
        Self {
            token: Some(CardToken {
                id: id.into(),
                card: None,
            }),
            error: None,
        }
    }

    pub fn rejected(error: GatewayMessage) -> Self {
        Self {
            token: None,
            error: Some(error),
        }
    }

    /// The usable token, or the message the shopper should see
    fn check(&self) -> Result<&CardToken, GatewayMessage> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let Some(token) = &self.token else {
            return Err(GatewayMessage::new("Your card details are incomplete.")
                .with_code("incomplete"));
        };
        let well_formed = token.id.len() > TOKEN_PREFIX.len()
            && token.id.starts_with(TOKEN_PREFIX)
            && token
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed {
            return Err(GatewayMessage::new("Your card details could not be read.")
                .with_code("invalid_token"));
        }
        Ok(token)
    }
}

#[derive(Default)]
struct ElementState {
    result: Option<ElementResult>,
    frozen: Option<CardToken>,
}

/// Card capture session
#[derive(Default)]
pub struct CardElement {
    state: Mutex<ElementState>,
}

impl CardElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Element already holding the form's result
    pub fn mounted(result: ElementResult) -> Self {
        let element = Self::new();
        element.update(result);
        element
    }

    /// Replace the current result. A previous finalization no longer applies.
    pub fn update(&self, result: ElementResult) {
        let mut state = self.lock();
        state.result = Some(result);
        state.frozen = None;
    }

    pub fn unmount(&self) {
        *self.lock() = ElementState::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CaptureSession for CardElement {
    fn is_ready(&self) -> bool {
        self.lock().result.is_some()
    }

    async fn finalize(&self) -> ServiceResult<Submission> {
        let mut state = self.lock();
        let result = state
            .result
            .as_ref()
            .ok_or_else(|| ServiceError::Configuration("Card element is not mounted".into()))?;

        match result.check() {
            Ok(token) => {
                let summary = token.card.clone().unwrap_or_default();
                debug!(
                    brand = summary.brand.as_deref().unwrap_or("unknown"),
                    last4 = summary.last4.as_deref().unwrap_or("????"),
                    "Card token finalized"
                );
                let token = token.clone();
                state.frozen = Some(token);
                Ok(Submission::Ready)
            }
            Err(message) => {
                state.frozen = None;
                Ok(Submission::Invalid(message))
            }
        }
    }

    fn payment_method_data(&self) -> ServiceResult<PaymentMethodData> {
        let state = self.lock();
        let token = state.frozen.as_ref().ok_or(ServiceError::NotFinalized)?;
        Ok(PaymentMethodData::new("card").with_field("card[token]", token.id.as_str()))
    }
}

impl fmt::Debug for CardElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CardElement")
            .field("mounted", &state.result.is_some())
            .field("finalized", &state.frozen.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_finalize_freezes_token() {
        let element = CardElement::mounted(ElementResult::tokenized("tok_1Nabc"));
        assert!(element.is_ready());
        assert!(matches!(
            element.payment_method_data(),
            Err(ServiceError::NotFinalized)
        ));

        assert_eq!(element.finalize().await.unwrap(), Submission::Ready);

        let data = element.payment_method_data().unwrap();
        assert_eq!(data.method_type, "card");
        assert_eq!(data.fields["card[token]"], "tok_1Nabc");
        assert_eq!(data.fields.len(), 1);
    }

    #[tokio::test]
    async fn test_form_error_is_reported_verbatim() {
        let element = CardElement::mounted(ElementResult::rejected(
            GatewayMessage::new("Your card number is invalid.").with_code("invalid_number"),
        ));

        match element.finalize().await.unwrap() {
            Submission::Invalid(message) => {
                assert_eq!(message.message, "Your card number is invalid.");
                assert_eq!(message.code.as_deref(), Some("invalid_number"));
            }
            Submission::Ready => panic!("expected invalid submission"),
        }
        assert!(element.payment_method_data().is_err());
    }

    #[tokio::test]
    async fn test_missing_token_is_incomplete() {
        let element = CardElement::mounted(ElementResult::default());

        let submission = element.finalize().await.unwrap();
        assert!(matches!(
            submission,
            Submission::Invalid(GatewayMessage { ref code, .. }) if code.as_deref() == Some("incomplete")
        ));
    }

    #[tokio::test]
    async fn test_only_card_tokens_are_accepted() {
        for id in ["4242424242424242", "pm_123", "tok_", "tok_ab cd"] {
            let element = CardElement::mounted(ElementResult::tokenized(id));
            assert!(
                matches!(element.finalize().await.unwrap(), Submission::Invalid(_)),
                "{id} accepted"
            );
        }
    }

    #[tokio::test]
    async fn test_update_discards_finalization() {
        let element = CardElement::mounted(ElementResult::tokenized("tok_visa"));
        element.finalize().await.unwrap();

        element.update(ElementResult::tokenized("tok_mastercard"));
        assert!(element.payment_method_data().is_err());
    }

    #[test]
    fn test_unmounted_is_not_ready() {
        let element = CardElement::mounted(ElementResult::tokenized("tok_visa"));
        element.unmount();
        assert!(!element.is_ready());
    }

    #[test]
    fn test_stripe_js_result_shape() {
        let result: ElementResult = serde_json::from_value(json!({
            "token": {
                "id": "tok_1Nabc",
                "object": "token",
                "card": {"brand": "Visa", "last4": "4242", "exp_year": 2030}
            }
        }))
        .unwrap();
        let token = result.token.unwrap();
        assert_eq!(token.id, "tok_1Nabc");
        assert_eq!(token.card.unwrap().last4.as_deref(), Some("4242"));

        let result: ElementResult = serde_json::from_value(json!({
            "error": {"type": "validation_error", "code": "incomplete_cvc",
                      "message": "Your card's security code is incomplete."}
        }))
        .unwrap();
        assert_eq!(result.error.unwrap().code.as_deref(), Some("incomplete_cvc"));
    }

    #[test]
    fn test_raw_card_fields_are_refused() {
        let result = serde_json::from_value::<ElementResult>(json!({
            "number": "4242424242424242",
            "exp_month": 12,
            "exp_year": 2030,
            "cvc": "123"
        }));
        assert!(result.is_err());
    }
}
