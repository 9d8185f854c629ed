//! Order repository.
//!
//! Orders are written by three independent paths (checkout, payment webhook,
//! admin fulfillment). Each path updates only its own columns with a
//! conditional `UPDATE`, so concurrent writers never clobber each other and a
//! status can only move along an edge of its transition table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use threadline_core::{
    CartLine, Email, FulfillmentStatus, Money, OrderId, PaymentStatus, UserId,
};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderFilter, Page, ShippingAddress, TransitionOutcome};

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new `pending` order.
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Get an order by id.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Find the order a payment session was opened for.
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError>;

    /// Find the newest `pending` order with this cart hash created at or
    /// after `since`.
    async fn find_pending_by_cart_hash(
        &self,
        cart_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Record the payment session handle and redirect URL on an order.
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    async fn attach_session(
        &self,
        id: OrderId,
        session_id: &str,
        checkout_url: &str,
    ) -> Result<(), RepositoryError>;

    /// Move `pending -> paid`, storing the confirmed total and payment intent.
    ///
    /// On an order that is already `paid` the total and intent are
    /// overwritten idempotently and `AlreadyApplied` is returned.
    async fn mark_paid(
        &self,
        id: OrderId,
        total: Money,
        payment_intent_id: Option<&str>,
    ) -> Result<TransitionOutcome, RepositoryError>;

    /// Move `pending -> canceled`.
    async fn mark_canceled(&self, id: OrderId) -> Result<TransitionOutcome, RepositoryError>;

    /// Orders visible to a customer: their account orders plus guest orders
    /// placed with their email. Newest first.
    async fn list_for_customer(
        &self,
        user_id: UserId,
        email: &Email,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Admin listing, newest first.
    async fn list(&self, filter: OrderFilter) -> Result<Page<Order>, RepositoryError>;

    /// Move fulfillment `from -> to` if the order is still at `from`.
    ///
    /// Returns `false` when the order moved concurrently. Callers validate
    /// the edge against the transition table first.
    async fn update_fulfillment(
        &self,
        id: OrderId,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, RepositoryError>;

    /// Record that the post-payment side effects of a paid order completed.
    ///
    /// Returns `false` if the marker was already set.
    async fn mark_inventory_committed(&self, id: OrderId) -> Result<bool, RepositoryError>;
}

/// Row type for `storefront.order`.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    email: String,
    items: Json<Vec<CartLine>>,
    shipping_address: Json<ShippingAddress>,
    shipping_method: String,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
    currency: String,
    payment_status: String,
    fulfillment_status: String,
    payment_session_id: Option<String>,
    payment_intent_id: Option<String>,
    checkout_url: Option<String>,
    cart_hash: String,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    inventory_committed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            RepositoryError::DataCorruption(format!("invalid {what} on order {}: {e}", r.id))
        };

        Ok(Self {
            id: OrderId::new(r.id),
            user_id: r.user_id.map(UserId::new),
            email: Email::parse(&r.email).map_err(|e| corrupt("email", &e))?,
            items: r.items.0,
            shipping_address: r.shipping_address.0,
            shipping_method: r
                .shipping_method
                .parse()
                .map_err(|e: String| corrupt("shipping method", &e))?,
            subtotal: Money::new(r.subtotal),
            shipping_cost: Money::new(r.shipping_cost),
            total: Money::new(r.total),
            currency: r
                .currency
                .parse()
                .map_err(|e: String| corrupt("currency", &e))?,
            payment_status: r
                .payment_status
                .parse()
                .map_err(|e| corrupt("payment status", &e))?,
            fulfillment_status: r
                .fulfillment_status
                .parse()
                .map_err(|e| corrupt("fulfillment status", &e))?,
            payment_session_id: r.payment_session_id,
            payment_intent_id: r.payment_intent_id,
            checkout_url: r.checkout_url,
            cart_hash: r.cart_hash,
            tracking_number: r.tracking_number,
            created_at: r.created_at,
            updated_at: r.updated_at,
            paid_at: r.paid_at,
            inventory_committed_at: r.inventory_committed_at,
        })
    }
}

/// `PostgreSQL` order repository.
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn payment_status(&self, id: OrderId) -> Result<PaymentStatus, RepositoryError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT payment_status FROM storefront.order WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        status
            .ok_or(RepositoryError::NotFound)?
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid payment status: {e}")))
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO storefront.order (
                user_id, email, items, shipping_address, shipping_method,
                subtotal, shipping_cost, total, currency, cart_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            ",
        )
        .bind(order.user_id)
        .bind(order.email.as_str())
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.shipping_method.as_str())
        .bind(order.subtotal.amount())
        .bind(order.shipping_cost.amount())
        .bind(order.total.amount())
        .bind(order.currency.as_str())
        .bind(&order.cart_hash)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM storefront.order WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM storefront.order WHERE payment_session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn find_pending_by_cart_hash(
        &self,
        cart_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM storefront.order
            WHERE cart_hash = $1
              AND payment_status = 'pending'
              AND created_at >= $2
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(cart_hash)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn attach_session(
        &self,
        id: OrderId,
        session_id: &str,
        checkout_url: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET payment_session_id = $2, checkout_url = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(session_id)
        .bind(checkout_url)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "payment session"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        total: Money,
        payment_intent_id: Option<&str>,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let moved = sqlx::query(
            r"
            UPDATE storefront.order
            SET payment_status = 'paid',
                total = $2,
                payment_intent_id = COALESCE($3, payment_intent_id),
                paid_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            ",
        )
        .bind(id)
        .bind(total.amount())
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await?;

        if moved.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }

        // Re-delivery on a paid order refreshes the provider's figures only.
        let refreshed = sqlx::query(
            r"
            UPDATE storefront.order
            SET total = $2,
                payment_intent_id = COALESCE($3, payment_intent_id),
                updated_at = NOW()
            WHERE id = $1 AND payment_status = 'paid'
            ",
        )
        .bind(id)
        .bind(total.amount())
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await?;

        if refreshed.rows_affected() > 0 {
            return Ok(TransitionOutcome::AlreadyApplied);
        }

        Ok(TransitionOutcome::Rejected(self.payment_status(id).await?))
    }

    async fn mark_canceled(&self, id: OrderId) -> Result<TransitionOutcome, RepositoryError> {
        let moved = sqlx::query(
            r"
            UPDATE storefront.order
            SET payment_status = 'canceled', updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if moved.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }

        Ok(match self.payment_status(id).await? {
            PaymentStatus::Canceled => TransitionOutcome::AlreadyApplied,
            current => TransitionOutcome::Rejected(current),
        })
    }

    async fn list_for_customer(
        &self,
        user_id: UserId,
        email: &Email,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM storefront.order
            WHERE user_id = $1 OR (user_id IS NULL AND email = $2)
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list(&self, filter: OrderFilter) -> Result<Page<Order>, RepositoryError> {
        let payment = filter.payment_status.map(PaymentStatus::as_str);
        let fulfillment = filter.fulfillment_status.map(FulfillmentStatus::as_str);

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM storefront.order
            WHERE ($1::text IS NULL OR payment_status = $1)
              AND ($2::text IS NULL OR fulfillment_status = $2)
            ",
        )
        .bind(payment)
        .bind(fulfillment)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM storefront.order
            WHERE ($1::text IS NULL OR payment_status = $1)
              AND ($2::text IS NULL OR fulfillment_status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(payment)
        .bind(fulfillment)
        .bind(filter.pagination.limit())
        .bind(filter.pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total, filter.pagination))
    }

    async fn update_fulfillment(
        &self,
        id: OrderId,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET fulfillment_status = $3,
                tracking_number = COALESCE($4, tracking_number),
                updated_at = NOW()
            WHERE id = $1 AND fulfillment_status = $2
            ",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(tracking_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_inventory_committed(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET inventory_committed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND inventory_committed_at IS NULL
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
