//! # Challenge Relay
//!
//! Hands a pending authentication from the gateway client back to the HTTP
//! request that started the attempt. The attempt keeps running in the
//! background while the shopper authenticates; the front end asks for its
//! result with the attempt id it was given.

use async_trait::async_trait;
use checkout_core::{CheckoutResult, CheckoutState, GatewayMessage, NextAction, Order};
use checkout_stripe::ChallengePresenter;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Finished attempts nobody asked for are dropped after this long
const FINISHED_RETENTION: Duration = Duration::from_secs(15 * 60);

tokio::task_local! {
    static CHALLENGE_SENDER: mpsc::UnboundedSender<PendingChallenge>;
}

/// Authentication the shopper has to complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingChallenge {
    pub intent_id: String,
    pub next_action: NextAction,
}

/// Run `attempt` with pending authentications delivered to `sender`
pub async fn relay_challenges<F: Future>(
    sender: mpsc::UnboundedSender<PendingChallenge>,
    attempt: F,
) -> F::Output {
    CHALLENGE_SENDER.scope(sender, attempt).await
}

/// Presenter that forwards the next action to the waiting request
#[derive(Debug, Default)]
pub struct RelayChallengePresenter;

#[async_trait]
impl ChallengePresenter for RelayChallengePresenter {
    async fn present(&self, intent_id: &str, action: &NextAction) -> Result<(), GatewayMessage> {
        let challenge = PendingChallenge {
            intent_id: intent_id.to_string(),
            next_action: action.clone(),
        };
        let delivered = CHALLENGE_SENDER
            .try_with(|sender| sender.send(challenge).is_ok())
            .unwrap_or(false);

        if delivered {
            info!(intent = intent_id, kind = %action.kind, "Authentication handed to shopper");
            Ok(())
        } else {
            warn!(intent = intent_id, "No request waiting for authentication");
            Err(GatewayMessage::new("Authentication could not be started.")
                .with_code("authentication_unavailable"))
        }
    }
}

/// An attempt waiting on the shopper
pub struct PendingAttempt {
    pub challenge: PendingChallenge,
    pub checkout: Arc<CheckoutState>,
    pub task: JoinHandle<CheckoutResult<Order>>,
    created: Instant,
}

impl PendingAttempt {
    pub fn new(
        challenge: PendingChallenge,
        checkout: Arc<CheckoutState>,
        task: JoinHandle<CheckoutResult<Order>>,
    ) -> Self {
        Self {
            challenge,
            checkout,
            task,
            created: Instant::now(),
        }
    }
}

/// Result of looking up an attempt
pub enum AttemptLookup {
    Unknown,
    Pending(PendingChallenge),
    Finished(PendingAttempt),
}

/// Attempts handed back to the front end for authentication
#[derive(Clone, Default)]
pub struct PendingAttempts {
    inner: Arc<Mutex<HashMap<String, PendingAttempt>>>,
}

impl PendingAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an attempt and return its id
    pub fn insert(&self, attempt: PendingAttempt) -> String {
        let id = Uuid::new_v4().to_string();
        let mut attempts = self.lock();
        attempts.retain(|_, a| !(a.task.is_finished() && a.created.elapsed() > FINISHED_RETENTION));
        attempts.insert(id.clone(), attempt);
        id
    }

    /// Finished attempts are handed out once
    pub fn lookup(&self, id: &str) -> AttemptLookup {
        let mut attempts = self.lock();
        match attempts.get(id) {
            None => AttemptLookup::Unknown,
            Some(attempt) if !attempt.task.is_finished() => {
                AttemptLookup::Pending(attempt.challenge.clone())
            }
            Some(_) => match attempts.remove(id) {
                Some(attempt) => AttemptLookup::Finished(attempt),
                None => AttemptLookup::Unknown,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingAttempt>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
