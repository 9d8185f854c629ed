//! Payment webhook reconciliation.
//!
//! The reconciler is the only writer of an order's payment status. Provider
//! deliveries are at-least-once and may arrive out of order, so every step is
//! idempotent: the event ledger skips redelivered event ids, and the order
//! transitions are conditional updates whose [`TransitionOutcome`] decides
//! whether side effects (clearing the buyer's cart, decrementing stock) run.

use thiserror::Error;

use threadline_core::{Money, OrderId};

use crate::db::{RepositoryError, Stores};
use crate::models::{Order, TransitionOutcome};
use crate::payments::{CheckoutSessionObject, PaymentError, PaymentEvent, WebhookEvent};

/// Errors while applying a verified event.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed event: {0}")]
    Payload(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event id was already in the ledger.
    Duplicate,
    /// The order moved to `paid`.
    Paid(OrderId),
    /// The order was already `paid`; total and intent refreshed, and any
    /// side effects left unfinished by an earlier delivery completed.
    AlreadyPaid(OrderId),
    /// The order moved to `canceled` (or already was).
    Canceled(OrderId),
    /// The transition table refused the change.
    Rejected(OrderId),
    /// No order matched the session.
    UnknownOrder,
    /// Event type we do not act on.
    Ignored,
}

/// Webhook reconciler.
pub struct WebhookService<'a> {
    stores: &'a Stores,
}

impl<'a> WebhookService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Apply a verified event body.
    ///
    /// # Errors
    ///
    /// Returns `Payload` for an unparseable body and `Repository` if the
    /// store fails. The event is only recorded in the ledger on success.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<WebhookOutcome, WebhookError> {
        let event = WebhookEvent::parse(payload)?;
        self.handle(&event).await
    }

    /// Apply a parsed event.
    ///
    /// # Errors
    ///
    /// See [`Self::handle_payload`].
    #[tracing::instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle(&self, event: &WebhookEvent) -> Result<WebhookOutcome, WebhookError> {
        if self.stores.webhook_events.is_processed(&event.id).await? {
            tracing::info!("Webhook event already processed");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = match event.kind()? {
            PaymentEvent::CheckoutCompleted(session) => self.checkout_completed(&session).await?,
            PaymentEvent::CheckoutExpired(session) => self.checkout_expired(&session).await?,
            PaymentEvent::Other => {
                tracing::debug!("Ignoring webhook event");
                WebhookOutcome::Ignored
            }
        };

        self.stores
            .webhook_events
            .record(&event.id, &event.event_type)
            .await?;

        Ok(outcome)
    }

    async fn checkout_completed(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(order) = self.resolve_order(session).await? else {
            tracing::warn!(session_id = %session.id, "Completed session has no matching order");
            return Ok(WebhookOutcome::UnknownOrder);
        };

        let total = session
            .amount_total
            .map_or(order.total, Money::from_minor_units);
        let outcome = self
            .stores
            .orders
            .mark_paid(order.id, total, session.payment_intent.as_deref())
            .await?;

        Ok(match outcome {
            TransitionOutcome::Applied => {
                tracing::info!(order_id = %order.id, total = %total, "Order paid");
                self.after_payment(&order).await?;
                WebhookOutcome::Paid(order.id)
            }
            TransitionOutcome::AlreadyApplied => {
                if order.inventory_committed_at.is_none() {
                    tracing::warn!(order_id = %order.id, "Resuming unfinished post-payment work");
                    self.after_payment(&order).await?;
                } else {
                    tracing::info!(order_id = %order.id, "Order already paid");
                }
                WebhookOutcome::AlreadyPaid(order.id)
            }
            TransitionOutcome::Rejected(current) => {
                tracing::warn!(
                    order_id = %order.id,
                    current = %current,
                    "Refusing to mark order paid"
                );
                WebhookOutcome::Rejected(order.id)
            }
        })
    }

    async fn checkout_expired(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(order) = self.stores.orders.find_by_session(&session.id).await? else {
            tracing::info!(session_id = %session.id, "Expired session has no matching order");
            return Ok(WebhookOutcome::UnknownOrder);
        };

        Ok(match self.stores.orders.mark_canceled(order.id).await? {
            TransitionOutcome::Applied | TransitionOutcome::AlreadyApplied => {
                tracing::info!(order_id = %order.id, "Order canceled after session expiry");
                WebhookOutcome::Canceled(order.id)
            }
            TransitionOutcome::Rejected(current) => {
                tracing::warn!(order_id = %order.id, current = %current, "Expiry for settled order");
                WebhookOutcome::Rejected(order.id)
            }
        })
    }

    /// Metadata order id first, then the session handle.
    async fn resolve_order(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<Option<Order>, RepositoryError> {
        if let Some(id) = session.order_id().and_then(|raw| raw.parse::<OrderId>().ok())
            && let Some(order) = self.stores.orders.get(id).await?
        {
            return Ok(Some(order));
        }
        self.stores.orders.find_by_session(&session.id).await
    }

    /// Side effects of a payment, run until they complete once.
    ///
    /// A failure leaves the order marker unset and the event out of the
    /// ledger, so the next completion delivered for the order (including a
    /// resend of the same event) retries the work.
    async fn after_payment(&self, order: &Order) -> Result<(), RepositoryError> {
        if let Some(user_id) = order.user_id {
            self.stores.carts.clear(user_id).await?;
        }
        self.stores.products.decrement_stock(&order.items).await?;
        self.stores.orders.mark_inventory_committed(order.id).await?;
        Ok(())
    }
}
