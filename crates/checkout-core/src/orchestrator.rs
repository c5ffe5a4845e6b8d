//! # Payment Orchestrator
//!
//! Turns captured card input into a placed order:
//!
//! ```text
//! finalize capture → tokenize → attach to cart → place order
//!                                                   │
//!                          continuation token? ─────┤
//!                                                   ▼
//!                          retrieve intent → resolve challenge (if next action)
//!                                                   │
//!                                                   ▼
//!                                            record order
//! ```
//!
//! Each step either advances or ends the attempt. Failures a step can
//! recognise become a specific `CheckoutError`; a collaborator call that
//! fails outright surfaces as `CheckoutError::Unexpected` through `?`.
//! `attempt_payment` then writes to the presentation sink exactly once.

use crate::collaborators::{
    CaptureSession, GatewayClient, SharedOrderService, SharedSink,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::handle::HandleCell;
use crate::messages::Messages;
use crate::model::{
    ChallengeOutcome, ContinuationToken, CustomerIdentity, Order, OrderResult, Submission,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Runs payment attempts against the current gateway and capture handles
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    gateway: HandleCell<dyn GatewayClient>,
    capture: HandleCell<dyn CaptureSession>,
    orders: SharedOrderService,
    sink: SharedSink,
    messages: Messages,
}

impl CheckoutOrchestrator {
    /// Create an orchestrator.
    ///
    /// The cells are shared with whoever owns the gateway client and the
    /// capture widget; replacing a handle there is seen by the next attempt.
    pub fn new(
        gateway: HandleCell<dyn GatewayClient>,
        capture: HandleCell<dyn CaptureSession>,
        orders: SharedOrderService,
        sink: SharedSink,
    ) -> Self {
        Self {
            gateway,
            capture,
            orders,
            sink,
            messages: Messages::default(),
        }
    }

    /// Builder: use a localized message catalogue
    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Attempt payment and place the order.
    ///
    /// On success the order is recorded in the sink and returned. On failure
    /// exactly one message has been reported to the sink and the error says
    /// which step ended the attempt. Each call is a fresh attempt: the card
    /// is tokenized again and no state carries over from earlier calls.
    #[instrument(skip_all)]
    pub async fn attempt_payment(&self, customer: &CustomerIdentity) -> CheckoutResult<Order> {
        match self.run(customer).await {
            Ok(order) => {
                info!(order_id = %order.id, "Order placed");
                self.sink.record_order(&order);
                Ok(order)
            }
            Err(err) => {
                match &err {
                    CheckoutError::Unexpected(source) => {
                        error!(error = %source, "Payment attempt aborted");
                    }
                    other => {
                        warn!(kind = other.kind(), "Payment attempt failed: {}", other);
                    }
                }
                self.sink.report_error(err.user_message(&self.messages));
                Err(err)
            }
        }
    }

    async fn run(&self, customer: &CustomerIdentity) -> CheckoutResult<Order> {
        let (gateway, capture) = match (self.gateway.current(), self.capture.current()) {
            (Some(gateway), Some(capture)) if capture.is_ready() => (gateway, capture),
            _ => return Err(CheckoutError::NotReady),
        };

        debug!("Finalizing capture session");
        if let Submission::Invalid(invalid) = capture.finalize().await? {
            return Err(CheckoutError::CaptureInvalid {
                message: invalid.message,
            });
        }

        debug!(provider = gateway.provider_name(), "Creating payment method");
        let response = gateway
            .create_payment_method(capture.as_ref(), customer)
            .await?;
        if let Some(rejected) = &response.error {
            return Err(CheckoutError::TokenizationFailed {
                message: rejected.message.clone(),
            });
        }
        let reference = response
            .reference()
            .ok_or(CheckoutError::TokenizationMalformed)?;

        debug!(payment_method = %reference, "Attaching payment method");
        self.orders.set_payment_method(&reference).await?;

        let placed = self
            .orders
            .place_order()
            .await?
            .ok_or(CheckoutError::PlacementFailed)?;

        match placed.outcome() {
            OrderResult::Completed(order) => Ok(order),
            OrderResult::PendingAuthentication { order, token } => {
                self.authenticate(gateway.as_ref(), &token).await?;
                Ok(order)
            }
        }
    }

    async fn authenticate(
        &self,
        gateway: &dyn GatewayClient,
        token: &ContinuationToken,
    ) -> CheckoutResult<()> {
        let intent = gateway.retrieve_intent(token).await?;
        if !intent.requires_action() {
            debug!(intent = %intent.id, "No authentication required");
            return Ok(());
        }

        debug!(intent = %intent.id, "Resolving authentication challenge");
        match gateway.resolve_challenge(token).await? {
            ChallengeOutcome::Resolved => Ok(()),
            ChallengeOutcome::Failed(detail) => {
                error!(intent = %intent.id, error = %detail, "Authentication challenge failed");
                Err(CheckoutError::ChallengeFailed { detail })
            }
        }
    }
}

impl std::fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("gateway", &self.gateway)
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

/// Convenience for callers holding plain `Arc`s
pub fn orchestrator_for(
    gateway: Arc<dyn GatewayClient>,
    capture: Arc<dyn CaptureSession>,
    orders: SharedOrderService,
    sink: SharedSink,
) -> CheckoutOrchestrator {
    CheckoutOrchestrator::new(
        HandleCell::with(gateway),
        HandleCell::with(capture),
        orders,
        sink,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::OrderService;
    use crate::error::{ServiceError, ServiceResult};
    use crate::model::{
        GatewayMessage, NextAction, PaymentIntent, PaymentMethodData, PaymentMethodReference,
        PaymentMethodResponse, PlacedOrder,
    };
    use crate::session::CheckoutState;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn log(calls: &Calls, call: impl Into<String>) {
        calls.lock().unwrap().push(call.into());
    }

    struct FakeCapture {
        calls: Calls,
        submission: Submission,
    }

    #[async_trait]
    impl CaptureSession for FakeCapture {
        fn is_ready(&self) -> bool {
            true
        }

        async fn finalize(&self) -> ServiceResult<Submission> {
            log(&self.calls, "capture.finalize");
            Ok(self.submission.clone())
        }

        fn payment_method_data(&self) -> ServiceResult<PaymentMethodData> {
            Ok(PaymentMethodData::new("card"))
        }
    }

    #[derive(Clone)]
    enum IntentReply {
        Plain,
        NeedsAction,
        Fails,
    }

    struct FakeGateway {
        name: &'static str,
        calls: Calls,
        tokenization: PaymentMethodResponse,
        intent: IntentReply,
        challenge: ChallengeOutcome,
    }

    #[async_trait]
    impl GatewayClient for FakeGateway {
        async fn create_payment_method(
            &self,
            _capture: &dyn CaptureSession,
            billing: &CustomerIdentity,
        ) -> ServiceResult<PaymentMethodResponse> {
            log(
                &self.calls,
                format!("{}.create_payment_method:{}", self.name, billing.full_name),
            );
            Ok(self.tokenization.clone())
        }

        async fn retrieve_intent(&self, token: &ContinuationToken) -> ServiceResult<PaymentIntent> {
            log(&self.calls, format!("{}.retrieve_intent", self.name));
            match self.intent {
                IntentReply::Plain => Ok(PaymentIntent {
                    id: token.intent_id().to_string(),
                    status: "succeeded".into(),
                    next_action: None,
                }),
                IntentReply::NeedsAction => Ok(PaymentIntent {
                    id: token.intent_id().to_string(),
                    status: "requires_action".into(),
                    next_action: Some(NextAction {
                        kind: "redirect_to_url".into(),
                        redirect_url: Some("https://hooks.stripe.com/3ds".into()),
                    }),
                }),
                IntentReply::Fails => Err(ServiceError::Gateway {
                    provider: "fake".into(),
                    status: 500,
                    message: "boom".into(),
                }),
            }
        }

        async fn resolve_challenge(
            &self,
            _token: &ContinuationToken,
        ) -> ServiceResult<ChallengeOutcome> {
            log(&self.calls, format!("{}.resolve_challenge", self.name));
            Ok(self.challenge.clone())
        }

        fn provider_name(&self) -> &'static str {
            self.name
        }
    }

    #[derive(Clone)]
    enum Placement {
        Completed,
        Pending,
        Nothing,
        Timeout,
    }

    struct FakeOrders {
        calls: Calls,
        attach_fails: bool,
        placement: Placement,
        attached: Mutex<Vec<PaymentMethodReference>>,
    }

    #[async_trait]
    impl OrderService for FakeOrders {
        async fn set_payment_method(&self, reference: &PaymentMethodReference) -> ServiceResult<()> {
            log(&self.calls, "orders.set_payment_method");
            if self.attach_fails {
                return Err(ServiceError::Transport("connection reset".into()));
            }
            self.attached.lock().unwrap().push(reference.clone());
            Ok(())
        }

        async fn place_order(&self) -> ServiceResult<Option<PlacedOrder>> {
            log(&self.calls, "orders.place_order");
            let order = Order::new("100000042").with_total(1000, "eur");
            match self.placement {
                Placement::Completed => Ok(Some(PlacedOrder::completed(order))),
                Placement::Pending => Ok(Some(PlacedOrder::pending(
                    order,
                    ContinuationToken::new("pi_42_secret_abc"),
                ))),
                Placement::Nothing => Ok(None),
                Placement::Timeout => Err(ServiceError::Transport("timed out".into())),
            }
        }
    }

    struct Harness {
        calls: Calls,
        submission: Submission,
        tokenization: PaymentMethodResponse,
        intent: IntentReply,
        challenge: ChallengeOutcome,
        attach_fails: bool,
        placement: Placement,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                submission: Submission::Ready,
                tokenization: PaymentMethodResponse::created("pm_1"),
                intent: IntentReply::Plain,
                challenge: ChallengeOutcome::Resolved,
                attach_fails: false,
                placement: Placement::Completed,
            }
        }

        fn gateway(&self, name: &'static str) -> Arc<dyn GatewayClient> {
            Arc::new(FakeGateway {
                name,
                calls: self.calls.clone(),
                tokenization: self.tokenization.clone(),
                intent: self.intent.clone(),
                challenge: self.challenge.clone(),
            })
        }

        fn build(&self) -> (CheckoutOrchestrator, Arc<CheckoutState>, Arc<FakeOrders>) {
            let state = Arc::new(CheckoutState::new());
            let orders = Arc::new(FakeOrders {
                calls: self.calls.clone(),
                attach_fails: self.attach_fails,
                placement: self.placement.clone(),
                attached: Mutex::new(Vec::new()),
            });
            let capture = Arc::new(FakeCapture {
                calls: self.calls.clone(),
                submission: self.submission.clone(),
            });
            let orchestrator =
                orchestrator_for(self.gateway("gateway"), capture, orders.clone(), state.clone());
            (orchestrator, state, orders)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn customer() -> CustomerIdentity {
        CustomerIdentity::new("Ada Lovelace", "ada@example.com")
    }

    fn assert_single_error(state: &CheckoutState, expected: &str) {
        assert_eq!(state.errors_reported(), 1);
        assert_eq!(state.orders_recorded(), 0);
        assert_eq!(state.error_message().as_deref(), Some(expected));
        assert!(state.order().is_none());
    }

    #[tokio::test]
    async fn test_completed_order_is_recorded() {
        let harness = Harness::new();
        let (orchestrator, state, orders) = harness.build();

        let order = orchestrator.attempt_payment(&customer()).await.unwrap();

        assert_eq!(order.id, "100000042");
        assert_eq!(state.order(), Some(order));
        assert_eq!(state.orders_recorded(), 1);
        assert_eq!(state.errors_reported(), 0);
        assert_eq!(orders.attached.lock().unwrap()[0].id(), "pm_1");
        assert_eq!(
            harness.calls(),
            vec![
                "capture.finalize",
                "gateway.create_payment_method:Ada Lovelace",
                "orders.set_payment_method",
                "orders.place_order",
            ]
        );
    }

    #[tokio::test]
    async fn test_not_ready_without_handles() {
        let state = Arc::new(CheckoutState::new());
        let harness = Harness::new();
        let orders = Arc::new(FakeOrders {
            calls: harness.calls.clone(),
            attach_fails: false,
            placement: Placement::Completed,
            attached: Mutex::new(Vec::new()),
        });
        let orchestrator = CheckoutOrchestrator::new(
            HandleCell::with(harness.gateway("gateway")),
            HandleCell::empty(),
            orders,
            state.clone(),
        );

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::NotReady));
        assert_single_error(&state, "Payment method not ready. Please try again.");
        assert!(harness.calls().is_empty());
    }

    #[tokio::test]
    async fn test_capture_error_is_reported_verbatim() {
        let mut harness = Harness::new();
        harness.submission = Submission::Invalid(GatewayMessage::new("Your card number is invalid."));
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::CaptureInvalid { .. }));
        assert_single_error(&state, "Your card number is invalid.");
        assert_eq!(harness.calls(), vec!["capture.finalize"]);
    }

    #[tokio::test]
    async fn test_tokenization_error_is_reported_verbatim() {
        let mut harness = Harness::new();
        harness.tokenization = PaymentMethodResponse::rejected(
            GatewayMessage::new("Your card was declined.").with_code("card_declined"),
        );
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::TokenizationFailed { .. }));
        assert_single_error(&state, "Your card was declined.");
        assert!(!harness.calls().contains(&"orders.set_payment_method".to_string()));
    }

    #[tokio::test]
    async fn test_missing_payment_method_id() {
        let mut harness = Harness::new();
        harness.tokenization = PaymentMethodResponse::default();
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::TokenizationMalformed));
        assert_single_error(&state, "Failed to create payment method. Please try again.");
    }

    #[tokio::test]
    async fn test_empty_payment_method_id_is_malformed() {
        let mut harness = Harness::new();
        harness.tokenization = PaymentMethodResponse::created("");
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::TokenizationMalformed));
        assert_eq!(state.errors_reported(), 1);
    }

    #[tokio::test]
    async fn test_no_order_from_placement() {
        let mut harness = Harness::new();
        harness.placement = Placement::Nothing;
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::PlacementFailed));
        assert_single_error(&state, "Failed to create order. Please try again.");
    }

    #[tokio::test]
    async fn test_token_without_next_action_skips_challenge() {
        let mut harness = Harness::new();
        harness.placement = Placement::Pending;
        let (orchestrator, state, _) = harness.build();

        let order = orchestrator.attempt_payment(&customer()).await.unwrap();

        assert_eq!(state.order(), Some(order));
        let calls = harness.calls();
        assert!(calls.contains(&"gateway.retrieve_intent".to_string()));
        assert!(!calls.contains(&"gateway.resolve_challenge".to_string()));
    }

    #[tokio::test]
    async fn test_resolved_challenge_records_order() {
        let mut harness = Harness::new();
        harness.placement = Placement::Pending;
        harness.intent = IntentReply::NeedsAction;
        let (orchestrator, state, _) = harness.build();

        orchestrator.attempt_payment(&customer()).await.unwrap();

        assert_eq!(state.orders_recorded(), 1);
        assert!(harness
            .calls()
            .contains(&"gateway.resolve_challenge".to_string()));
    }

    #[tokio::test]
    async fn test_failed_challenge_never_records_order() {
        let mut harness = Harness::new();
        harness.placement = Placement::Pending;
        harness.intent = IntentReply::NeedsAction;
        harness.challenge = ChallengeOutcome::Failed(GatewayMessage::new(
            "We are unable to authenticate your payment method.",
        ));
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        match err {
            CheckoutError::ChallengeFailed { detail } => {
                assert_eq!(
                    detail.message,
                    "We are unable to authenticate your payment method."
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_single_error(
            &state,
            "This transaction could not be finalized. Please select another payment method.",
        );
    }

    #[tokio::test]
    async fn test_intent_retrieval_failure_is_generic() {
        let mut harness = Harness::new();
        harness.placement = Placement::Pending;
        harness.intent = IntentReply::Fails;
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Unexpected(_)));
        assert_single_error(
            &state,
            "This transaction could not be performed. Please select another payment method.",
        );
    }

    #[tokio::test]
    async fn test_attach_failure_is_generic() {
        let mut harness = Harness::new();
        harness.attach_fails = true;
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Unexpected(_)));
        assert_single_error(
            &state,
            "This transaction could not be performed. Please select another payment method.",
        );
        assert!(!harness.calls().contains(&"orders.place_order".to_string()));
    }

    #[tokio::test]
    async fn test_placement_timeout_is_generic() {
        let mut harness = Harness::new();
        harness.placement = Placement::Timeout;
        let (orchestrator, state, _) = harness.build();

        let err = orchestrator.attempt_payment(&customer()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Unexpected(_)));
        assert_single_error(
            &state,
            "This transaction could not be performed. Please select another payment method.",
        );
    }

    #[tokio::test]
    async fn test_each_attempt_tokenizes_again() {
        let harness = Harness::new();
        let (orchestrator, state, orders) = harness.build();

        orchestrator.attempt_payment(&customer()).await.unwrap();
        orchestrator.attempt_payment(&customer()).await.unwrap();

        let tokenizations = harness
            .calls()
            .iter()
            .filter(|c| c.contains("create_payment_method"))
            .count();
        assert_eq!(tokenizations, 2);
        assert_eq!(orders.attached.lock().unwrap().len(), 2);
        assert_eq!(state.orders_recorded(), 2);
    }

    #[tokio::test]
    async fn test_replaced_gateway_is_used_by_next_attempt() {
        let harness = Harness::new();
        let state = Arc::new(CheckoutState::new());
        let orders = Arc::new(FakeOrders {
            calls: harness.calls.clone(),
            attach_fails: false,
            placement: Placement::Completed,
            attached: Mutex::new(Vec::new()),
        });
        let gateway_cell = HandleCell::with(harness.gateway("stale"));
        let capture: Arc<dyn CaptureSession> = Arc::new(FakeCapture {
            calls: harness.calls.clone(),
            submission: Submission::Ready,
        });
        let capture_cell = HandleCell::with(capture);
        let orchestrator =
            CheckoutOrchestrator::new(gateway_cell.clone(), capture_cell, orders, state);

        gateway_cell.set(harness.gateway("fresh"));
        orchestrator.attempt_payment(&customer()).await.unwrap();

        let calls = harness.calls();
        assert!(calls.contains(&"fresh.create_payment_method:Ada Lovelace".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("stale.")));
    }
}
