//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Stores;
use crate::payments::{PaymentGateway, WebhookVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// repositories, the payment gateway and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    stores: Stores,
    gateway: Arc<dyn PaymentGateway>,
    verifier: WebhookVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The webhook verifier is built from the configured signing secret.
    #[must_use]
    pub fn new(config: StorefrontConfig, stores: Stores, gateway: Arc<dyn PaymentGateway>) -> Self {
        let verifier = WebhookVerifier::new(config.stripe.webhook_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                gateway,
                verifier,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the repositories.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    /// Get the payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get the webhook signature verifier.
    #[must_use]
    pub fn webhook_verifier(&self) -> &WebhookVerifier {
        &self.inner.verifier
    }
}
