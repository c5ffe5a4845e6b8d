//! # Stripe Configuration
//!
//! Configuration management for the Stripe gateway client.
//! Keys and overrides are loaded from environment variables.

use checkout_core::ServiceError;
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Options the embedded payment form is mounted with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsOptions {
    /// Intent mode the form collects for
    pub mode: String,
    /// Amount shown by wallets before the cart total is known (minor units)
    pub amount: i64,
    pub currency: String,
    /// "manual": the form only collects, tokenization is triggered explicitly
    pub payment_method_creation: String,
}

impl Default for ElementsOptions {
    fn default() -> Self {
        Self {
            mode: "payment".to_string(),
            amount: 1000,
            currency: "eur".to_string(),
            payment_method_creation: "manual".to_string(),
        }
    }
}

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Publishable key (pk_test_... or pk_live_...)
    pub publishable_key: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    /// Locale for gateway-generated messages (e.g., "de")
    pub locale: Option<String>,

    /// How often a pending authentication is polled
    pub challenge_poll_interval: Duration,

    /// How long a pending authentication may take
    pub challenge_timeout: Duration,

    /// Embedded form options
    pub elements: ElementsOptions,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_PUBLISHABLE_KEY`
    ///
    /// Optional:
    /// - `STRIPE_API_BASE_URL`, `STRIPE_LOCALE`
    /// - `STRIPE_ELEMENTS_AMOUNT`, `STRIPE_ELEMENTS_CURRENCY`
    /// - `STRIPE_CHALLENGE_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Re-read configuration for a running process.
    ///
    /// Values in the env file win over the process environment, so edits to
    /// the file take effect even though the first load exported it. A
    /// missing file leaves the process environment alone in charge.
    pub fn reload_from_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let file: HashMap<String, String> = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries.collect::<Result<_, _>>().map_err(|e| {
                ServiceError::Configuration(format!("Invalid {}: {}", path.display(), e))
            })?,
            Err(e) if e.not_found() => HashMap::new(),
            Err(e) => {
                return Err(ServiceError::Configuration(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::from_lookup(|key| file.get(key).cloned().or_else(|| env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let publishable_key = lookup("STRIPE_PUBLISHABLE_KEY").ok_or_else(|| {
            ServiceError::Configuration("STRIPE_PUBLISHABLE_KEY not set".to_string())
        })?;

        let mut config = Self::new(publishable_key);
        config.validate()?;

        if let Some(url) = lookup("STRIPE_API_BASE_URL") {
            config.api_base_url = url;
        }
        config.locale = lookup("STRIPE_LOCALE").filter(|l| !l.is_empty());

        if let Some(amount) = lookup("STRIPE_ELEMENTS_AMOUNT").and_then(|a| a.parse().ok()) {
            config.elements.amount = amount;
        }
        if let Some(currency) = lookup("STRIPE_ELEMENTS_CURRENCY") {
            config.elements.currency = currency.to_lowercase();
        }
        if let Some(secs) = lookup("STRIPE_CHALLENGE_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.challenge_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(publishable_key: impl Into<String>) -> Self {
        Self {
            publishable_key: publishable_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            locale: None,
            challenge_poll_interval: Duration::from_secs(2),
            challenge_timeout: Duration::from_secs(300),
            elements: ElementsOptions::default(),
        }
    }

    /// Check the key format
    pub fn validate(&self) -> Result<(), ServiceError> {
        if !self.publishable_key.starts_with("pk_test_")
            && !self.publishable_key.starts_with("pk_live_")
        {
            return Err(ServiceError::Configuration(
                "STRIPE_PUBLISHABLE_KEY must start with pk_test_ or pk_live_".to_string(),
            ));
        }
        Ok(())
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.publishable_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set challenge polling
    pub fn with_challenge_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.challenge_poll_interval = interval;
        self.challenge_timeout = timeout;
        self
    }

    /// Builder: set locale
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(StripeConfig::new("pk_test_abc123").validate().is_ok());
        assert!(StripeConfig::new("pk_live_abc123").validate().is_ok());
        assert!(StripeConfig::new("sk_test_abc123").validate().is_err());
    }

    #[test]
    fn test_auth_header() {
        let config = StripeConfig::new("pk_test_abc123");
        assert_eq!(config.auth_header(), "Bearer pk_test_abc123");
    }

    #[test]
    fn test_elements_options_json() {
        let json = serde_json::to_value(ElementsOptions::default()).unwrap();
        assert_eq!(json["mode"], "payment");
        assert_eq!(json["amount"], 1000);
        assert_eq!(json["currency"], "eur");
        assert_eq!(json["paymentMethodCreation"], "manual");
    }

    fn env_file(contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("checkout-stripe-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reload_picks_up_edited_file() {
        let path = env_file("STRIPE_PUBLISHABLE_KEY=pk_test_old\n");
        assert_eq!(
            StripeConfig::reload_from_file(&path).unwrap().publishable_key,
            "pk_test_old"
        );

        std::fs::write(&path, "STRIPE_PUBLISHABLE_KEY=pk_test_new\nSTRIPE_LOCALE=de\n").unwrap();
        let config = StripeConfig::reload_from_file(&path).unwrap();
        assert_eq!(config.publishable_key, "pk_test_new");
        assert_eq!(config.locale.as_deref(), Some("de"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_reload_file_wins_over_exported_value() {
        env::set_var("STRIPE_ELEMENTS_CURRENCY", "usd");
        let path = env_file("STRIPE_PUBLISHABLE_KEY=pk_test_abc\nSTRIPE_ELEMENTS_CURRENCY=CHF\n");

        let config = StripeConfig::reload_from_file(&path).unwrap();
        assert_eq!(config.elements.currency, "chf");

        env::remove_var("STRIPE_ELEMENTS_CURRENCY");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_reload_rejects_bad_key() {
        let path = env_file("STRIPE_PUBLISHABLE_KEY=sk_test_secret\n");
        assert!(StripeConfig::reload_from_file(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_from_env_missing_key() {
        env::remove_var("STRIPE_PUBLISHABLE_KEY");

        let result = StripeConfig::from_env();
        assert!(result.is_err());
    }
}
