//! Ledger of processed payment-provider events.
//!
//! The provider delivers at least once. An event id is recorded only after
//! its effects are applied, so a crash in between leads to a redelivery that
//! the conditional order updates absorb.

use async_trait::async_trait;
use sqlx::PgPool;

use super::RepositoryError;

/// Processed-event ledger.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Whether an event id has already been processed.
    async fn is_processed(&self, event_id: &str) -> Result<bool, RepositoryError>;

    /// Record an event id as processed. Recording twice is a no-op.
    async fn record(&self, event_id: &str, event_type: &str) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` webhook event ledger.
pub struct WebhookEventRepository {
    pool: PgPool,
}

impl WebhookEventRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventStore for WebhookEventRepository {
    async fn is_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM storefront.webhook_event WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn record(&self, event_id: &str, event_type: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.webhook_event (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
