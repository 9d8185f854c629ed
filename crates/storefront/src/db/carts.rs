//! Server-side cart repository.
//!
//! Implements the same merge semantics as [`threadline_core::Cart`] against
//! `storefront.cart_item`: adds are an atomic upsert that sums quantities,
//! quantity updates are last-write-wins, and a quantity of zero or below
//! deletes the line.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use threadline_core::{Cart, CartKey, CartLine, MAX_LINE_QUANTITY, Money, ProductId, UserId};

use super::{RepositoryError, column_option, option_column};

/// Per-user server cart.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's cart, most recently added line first.
    async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError>;

    /// Add a line, summing quantities with an existing line of the same key.
    async fn add(&self, user_id: UserId, line: CartLine) -> Result<(), RepositoryError>;

    /// Set a line's quantity; zero or below removes it.
    ///
    /// Returns `true` if a line changed.
    async fn update(
        &self,
        user_id: UserId,
        key: &CartKey,
        quantity: i64,
    ) -> Result<bool, RepositoryError>;

    /// Remove a line. Returns `true` if a line was removed.
    async fn remove(&self, user_id: UserId, key: &CartKey) -> Result<bool, RepositoryError>;

    /// Remove every line.
    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError>;

    /// Merge a guest cart into the user's cart with add semantics.
    async fn merge(&self, user_id: UserId, cart: Cart) -> Result<(), RepositoryError>;
}

/// Row type for `storefront.cart_item`.
#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: i32,
    size: String,
    color: String,
    title: String,
    slug: String,
    image: Option<String>,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<CartItemRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(r: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(r.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative cart quantity: {}", r.quantity))
        })?;

        Ok(Self {
            key: CartKey::new(
                ProductId::new(r.product_id),
                column_option(r.size),
                column_option(r.color),
            ),
            title: r.title,
            slug: r.slug,
            image: r.image,
            unit_price: Money::new(r.unit_price),
            quantity,
        })
    }
}

fn quantity_column(quantity: u32) -> i32 {
    i32::try_from(quantity.min(MAX_LINE_QUANTITY)).unwrap_or(i32::MAX)
}

/// `PostgreSQL` cart repository.
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        line: &CartLine,
    ) -> Result<(), RepositoryError> {
        if line.quantity == 0 {
            return Ok(());
        }

        sqlx::query(
            r"
            INSERT INTO storefront.cart_item
                (user_id, product_id, size, color, title, slug, image, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, product_id, size, color) DO UPDATE
            SET quantity = LEAST(storefront.cart_item.quantity + EXCLUDED.quantity, $10),
                title = EXCLUDED.title,
                slug = EXCLUDED.slug,
                image = EXCLUDED.image,
                unit_price = EXCLUDED.unit_price
            ",
        )
        .bind(user_id)
        .bind(line.key.product_id)
        .bind(option_column(line.key.size.as_ref()))
        .bind(option_column(line.key.color.as_ref()))
        .bind(&line.title)
        .bind(&line.slug)
        .bind(line.image.as_deref())
        .bind(line.unit_price.amount())
        .bind(quantity_column(line.quantity))
        .bind(quantity_column(MAX_LINE_QUANTITY))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CartStore for CartRepository {
    async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT product_id, size, color, title, slug, image, unit_price, quantity
            FROM storefront.cart_item
            WHERE user_id = $1
            ORDER BY id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(CartLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Cart::from(lines))
    }

    async fn add(&self, user_id: UserId, line: CartLine) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert(&mut tx, user_id, &line).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(
        &self,
        user_id: UserId,
        key: &CartKey,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        if quantity <= 0 {
            return self.remove(user_id, key).await;
        }

        let quantity = u32::try_from(quantity).unwrap_or(MAX_LINE_QUANTITY);

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_item
            SET quantity = $5
            WHERE user_id = $1 AND product_id = $2 AND size = $3 AND color = $4
            ",
        )
        .bind(user_id)
        .bind(key.product_id)
        .bind(option_column(key.size.as_ref()))
        .bind(option_column(key.color.as_ref()))
        .bind(quantity_column(quantity))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, user_id: UserId, key: &CartKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item
            WHERE user_id = $1 AND product_id = $2 AND size = $3 AND color = $4
            ",
        )
        .bind(user_id)
        .bind(key.product_id)
        .bind(option_column(key.size.as_ref()))
        .bind(option_column(key.color.as_ref()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn merge(&self, user_id: UserId, cart: Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        // Oldest first, so the guest cart's newest line ends up on top.
        for line in cart.lines().iter().rev() {
            Self::upsert(&mut tx, user_id, line).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
