//! Product catalog repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use threadline_core::{CartLine, Money, ProductId, ProductStatus};

use super::RepositoryError;
use crate::models::{NewProduct, Page, Pagination, Product, ProductFilter, ProductUpdate, Variant};

/// Catalog persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Active products matching a filter, newest first.
    async fn list_active(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError>;

    /// All products regardless of status, newest first.
    async fn list_all(&self, pagination: Pagination) -> Result<Page<Product>, RepositoryError>;

    /// Get a product by id, any status.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Get a product by slug, any status.
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError>;

    /// Create a product. Returns `Conflict` if the slug is taken.
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Apply a partial update.
    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError>;

    /// Show or hide a product.
    async fn set_status(&self, id: ProductId, status: ProductStatus)
    -> Result<(), RepositoryError>;

    /// Decrement variant stock for purchased lines, flooring at zero.
    ///
    /// Lines whose product or variant no longer exists are skipped.
    async fn decrement_stock(&self, lines: &[CartLine]) -> Result<(), RepositoryError>;
}

/// Row type for `storefront.product`.
#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    id: i32,
    slug: String,
    title: String,
    description: String,
    price: Decimal,
    status: String,
    tags: Vec<String>,
    images: Json<Vec<String>>,
    variants: Json<Vec<Variant>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let status = r.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid status on product {}: {e}", r.id))
        })?;

        Ok(Self {
            id: ProductId::new(r.id),
            slug: r.slug,
            title: r.title,
            description: r.description,
            price: Money::new(r.price),
            status,
            tags: r.tags,
            images: r.images.0,
            variants: r.variants.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// `PostgreSQL` product repository.
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Shared `WHERE` clause for storefront listings. Every filter is optional;
/// a `NULL` parameter disables its predicate.
const ACTIVE_FILTER: &str = r"
    WHERE status = 'active'
      AND ($1::text IS NULL OR title ILIKE '%' || $1 || '%')
      AND ($2::text IS NULL OR $2 = ANY(tags))
      AND ($3::text IS NULL OR variants @> jsonb_build_array(jsonb_build_object('size', $3::text)))
      AND ($4::text IS NULL OR variants @> jsonb_build_array(jsonb_build_object('color', $4::text)))
      AND ($5::numeric IS NULL OR price >= $5)
      AND ($6::numeric IS NULL OR price <= $6)
";

#[async_trait]
impl ProductStore for ProductRepository {
    async fn list_active(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError> {
        let min_price = filter.min_price.map(Money::amount);
        let max_price = filter.max_price.map(Money::amount);

        let count_sql = format!("SELECT COUNT(*) FROM storefront.product {ACTIVE_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.q.as_deref())
            .bind(filter.tag.as_deref())
            .bind(filter.size.as_deref())
            .bind(filter.color.as_deref())
            .bind(min_price)
            .bind(max_price)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT * FROM storefront.product {ACTIVE_FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $7 OFFSET $8"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&list_sql)
            .bind(filter.q.as_deref())
            .bind(filter.tag.as_deref())
            .bind(filter.size.as_deref())
            .bind(filter.color.as_deref())
            .bind(min_price)
            .bind(max_price)
            .bind(filter.pagination.limit())
            .bind(filter.pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(into_products(rows)?, total, filter.pagination))
    }

    async fn list_all(&self, pagination: Pagination) -> Result<Page<Product>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.product")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT * FROM storefront.product
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(into_products(rows)?, total, pagination))
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM storefront.product WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM storefront.product WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO storefront.product
                (slug, title, description, price, status, tags, images, variants)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            ",
        )
        .bind(&product.slug)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.status.as_str())
        .bind(&product.tags)
        .bind(Json(&product.images))
        .bind(Json(&product.variants))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "product slug"))?;

        row.try_into()
    }

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM storefront.product WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut product = Product::try_from(row)?;
        update.apply(&mut product);

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE storefront.product
            SET title = $2, description = $3, price = $4, tags = $5,
                images = $6, variants = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(&product.tags)
        .bind(Json(&product.images))
        .bind(Json(&product.variants))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    async fn set_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.product SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn decrement_stock(&self, lines: &[CartLine]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for line in lines {
            let variants: Option<Json<Vec<Variant>>> = sqlx::query_scalar(
                "SELECT variants FROM storefront.product WHERE id = $1 FOR UPDATE",
            )
            .bind(line.key.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(Json(mut variants)) = variants else {
                tracing::warn!(product_id = %line.key.product_id, "Purchased product no longer exists");
                continue;
            };

            let Some(variant) = variants.iter_mut().find(|v| v.matches(&line.key)) else {
                continue;
            };

            let sold = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            variant.stock = variant.stock.saturating_sub(sold).max(0);

            sqlx::query(
                "UPDATE storefront.product SET variants = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(line.key.product_id)
            .bind(Json(&variants))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
