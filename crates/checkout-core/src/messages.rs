//! # Message Catalogue
//!
//! Shopper-facing messages produced by the checkout engine itself.
//! Gateway and capture-widget messages are never translated here; they
//! arrive already localized.
//!
//! Translations are keyed by the English source text, loaded from a TOML
//! file of the form:
//!
//! ```toml
//! [translations]
//! "Failed to create order. Please try again." = "Bestellung fehlgeschlagen."
//! ```

use crate::error::ServiceError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Messages the engine can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    NotReady,
    PaymentMethodCreationFailed,
    OrderCreationFailed,
    TransactionNotFinalized,
    TransactionNotPerformed,
}

impl Message {
    /// English source text, also the translation key
    pub fn source(&self) -> &'static str {
        match self {
            Message::NotReady => "Payment method not ready. Please try again.",
            Message::PaymentMethodCreationFailed => {
                "Failed to create payment method. Please try again."
            }
            Message::OrderCreationFailed => "Failed to create order. Please try again.",
            Message::TransactionNotFinalized => {
                "This transaction could not be finalized. Please select another payment method."
            }
            Message::TransactionNotPerformed => {
                "This transaction could not be performed. Please select another payment method."
            }
        }
    }
}

/// Translation hook for shopper-facing text
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> String;
}

/// Leaves every message in English
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Translation table keyed by English source text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationTable {
    #[serde(default)]
    pub translations: HashMap<String, String>,
}

impl TranslationTable {
    /// Parse a TOML translation table
    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Configuration(format!("Invalid translations: {}", e)))
    }

    /// Load from a file; a missing file yields an empty table
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ServiceError::Configuration(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

impl Translator for TranslationTable {
    fn translate(&self, text: &str) -> String {
        self.translations
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }
}

/// Catalogue resolving engine messages through a translator
#[derive(Clone)]
pub struct Messages {
    translator: Arc<dyn Translator>,
}

impl Messages {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }

    /// Localized text for a message
    pub fn text(&self, message: Message) -> String {
        self.translator.translate(message.source())
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::new(Arc::new(IdentityTranslator))
    }
}

impl std::fmt::Debug for Messages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messages").finish_non_exhaustive()
    }
}
