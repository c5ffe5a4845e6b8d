//! # Checkout State
//!
//! In-memory cart/session state: the order of record and the error message
//! currently shown to the shopper. Implements `PresentationSink`.

use crate::collaborators::PresentationSink;
use crate::model::Order;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    order: Option<Order>,
    error_message: Option<String>,
    orders_recorded: u32,
    errors_reported: u32,
}

/// Shopper-visible checkout state
#[derive(Debug, Default)]
pub struct CheckoutState {
    inner: Mutex<Inner>,
}

impl CheckoutState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest order of record
    pub fn order(&self) -> Option<Order> {
        self.lock().order.clone()
    }

    /// The message currently shown to the shopper
    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    /// Dismiss the current error message
    pub fn clear_error(&self) {
        self.lock().error_message = None;
    }

    /// Number of `record_order` calls so far
    pub fn orders_recorded(&self) -> u32 {
        self.lock().orders_recorded
    }

    /// Number of `report_error` calls so far
    pub fn errors_reported(&self) -> u32 {
        self.lock().errors_reported
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PresentationSink for CheckoutState {
    fn report_error(&self, message: String) {
        let mut inner = self.lock();
        inner.error_message = Some(message);
        inner.errors_reported += 1;
    }

    fn record_order(&self, order: &Order) {
        let mut inner = self.lock();
        inner.order = Some(order.clone());
        inner.orders_recorded += 1;
    }
}
