//! # Handle Cells
//!
//! Gateway clients and capture widgets are owned by the hosting layer and
//! can be re-created at any time (key rotation, the form being re-mounted).
//! Code that needs them holds a `HandleCell` and reads it when it acts, so
//! it always sees the handle that is current at that moment.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared, replaceable pointer to the latest handle
pub struct HandleCell<T: ?Sized> {
    slot: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T: ?Sized> HandleCell<T> {
    /// A cell with no handle yet
    pub fn empty() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// A cell holding `handle`
    pub fn with(handle: Arc<T>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(handle))),
        }
    }

    /// Replace the handle. Every clone of this cell observes the new one.
    pub fn set(&self, handle: Arc<T>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Drop the handle (e.g., widget unmounted)
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The handle as of now
    pub fn current(&self) -> Option<Arc<T>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: ?Sized> Clone for HandleCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: ?Sized> Default for HandleCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> fmt::Debug for HandleCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCell")
            .field("set", &self.is_set())
            .finish()
    }
}
