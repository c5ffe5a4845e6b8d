//! # Merchant Order Service
//!
//! `OrderService` over the storefront's GraphQL API. One instance is bound
//! to one shopper cart.

use async_trait::async_trait;
use checkout_core::{
    ContinuationToken, Order, OrderService, PaymentMethodReference, PlacedOrder, ServiceError,
    ServiceResult,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

const SET_PAYMENT_METHOD_MUTATION: &str = r#"
mutation SetPaymentMethod($cartId: String!, $code: String!, $paymentMethodId: String!) {
  setPaymentMethodOnCart(input: {
    cart_id: $cartId
    payment_method: { code: $code, stripe_payments: { payment_method: $paymentMethodId } }
  }) {
    cart { selected_payment_method { code } }
  }
}"#;

const PLACE_ORDER_MUTATION: &str = r#"
mutation PlaceOrder($cartId: String!) {
  placeOrder(input: { cart_id: $cartId }) {
    order {
      order_number
      status
      grand_total { value currency }
      client_secret
    }
  }
}"#;

/// Storefront endpoint settings
#[derive(Debug, Clone)]
pub struct MerchantConfig {
    /// GraphQL endpoint (e.g., "https://shop.example.com/graphql")
    pub graphql_url: String,
    /// Payment method code the storefront registers the gateway under
    pub payment_method_code: String,
    /// Optional store view header
    pub store_code: Option<String>,
}

impl MerchantConfig {
    pub fn new(graphql_url: impl Into<String>) -> Self {
        Self {
            graphql_url: graphql_url.into(),
            payment_method_code: "stripe_payments".to_string(),
            store_code: None,
        }
    }
}

/// Order service for one cart
pub struct GraphQlOrderService {
    client: Client,
    config: MerchantConfig,
    cart_id: String,
    authorization: Option<String>,
}

impl GraphQlOrderService {
    pub fn new(client: Client, config: MerchantConfig, cart_id: impl Into<String>) -> Self {
        Self {
            client,
            config,
            cart_id: cart_id.into(),
            authorization: None,
        }
    }

    /// Builder: forward the shopper's storefront authorization header
    pub fn with_authorization(mut self, authorization: Option<String>) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn cart_id(&self) -> &str {
        &self.cart_id
    }

    async fn execute(&self, query: &str, variables: Value) -> ServiceResult<Value> {
        let mut request = self
            .client
            .post(&self.config.graphql_url)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }
        if let Some(store) = &self.config.store_code {
            request = request.header("Store", store);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !status.is_success() {
            error!("Order service error: status={}", status);
            return Err(ServiceError::OrderService(format!("HTTP {}", status)));
        }

        let envelope: GraphQlResponse = serde_json::from_str(&body).map_err(|e| {
            ServiceError::Protocol(format!("Failed to parse order service response: {}", e))
        })?;

        if let Some(first) = envelope.errors.first() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            error!(errors = ?messages, "Order service returned errors");
            return Err(ServiceError::OrderService(first.message.clone()));
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl OrderService for GraphQlOrderService {
    #[instrument(skip_all, fields(cart_id = %self.cart_id))]
    async fn set_payment_method(&self, reference: &PaymentMethodReference) -> ServiceResult<()> {
        self.execute(
            SET_PAYMENT_METHOD_MUTATION,
            json!({
                "cartId": self.cart_id,
                "code": self.config.payment_method_code,
                "paymentMethodId": reference.id(),
            }),
        )
        .await?;
        debug!("Payment method set on cart");
        Ok(())
    }

    #[instrument(skip_all, fields(cart_id = %self.cart_id))]
    async fn place_order(&self) -> ServiceResult<Option<PlacedOrder>> {
        let data = self
            .execute(PLACE_ORDER_MUTATION, json!({ "cartId": self.cart_id }))
            .await?;

        let raw = data
            .get("placeOrder")
            .and_then(|p| p.get("order"))
            .cloned()
            .unwrap_or(Value::Null);
        if raw.is_null() {
            return Ok(None);
        }

        let placed: PlacedOrderPayload = serde_json::from_value(raw).map_err(|e| {
            ServiceError::Protocol(format!("Failed to parse placed order: {}", e))
        })?;

        let Some(placed) = placed.into_placed() else {
            return Ok(None);
        };
        info!(
            order_id = %placed.order.id,
            pending_authentication = placed.continuation.is_some(),
            "Order placed by storefront"
        );
        Ok(Some(placed))
    }
}

// =============================================================================
// GraphQL Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Money {
    value: f64,
    currency: String,
}

/// ISO 4217 codes whose minor unit is not a hundredth
const ZERO_DECIMAL_CURRENCIES: [&str; 16] = [
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];
const THREE_DECIMAL_CURRENCIES: [&str; 5] = ["BHD", "JOD", "KWD", "OMR", "TND"];

/// Convert a storefront decimal amount to the currency's smallest unit
fn to_minor_units(value: f64, currency: &str) -> i64 {
    let code = currency.to_ascii_uppercase();
    let exponent = if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        3
    } else {
        2
    };
    (value * 10f64.powi(exponent)).round() as i64
}

#[derive(Debug, Deserialize)]
struct PlacedOrderPayload {
    #[serde(default)]
    order_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    grand_total: Option<Money>,
    #[serde(default)]
    client_secret: Option<String>,
}

impl PlacedOrderPayload {
    fn into_placed(self) -> Option<PlacedOrder> {
        let number = self.order_number.filter(|n| !n.is_empty())?;

        let mut order = Order::new(number);
        order.status = self.status;
        if let Some(total) = self.grand_total {
            order = order.with_total(to_minor_units(total.value, &total.currency), total.currency);
        }

        let continuation = self
            .client_secret
            .filter(|s| !s.is_empty())
            .map(ContinuationToken::new);

        Some(PlacedOrder {
            order,
            continuation,
        })
    }
}
