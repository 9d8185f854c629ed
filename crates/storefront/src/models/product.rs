//! Product catalog types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_core::{CartKey, Money, ProductId, ProductStatus};

use super::Pagination;

/// A purchasable (size, color) combination and its stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub stock: i32,
}

impl Variant {
    /// Whether this variant is the one a cart key selects.
    #[must_use]
    pub fn matches(&self, key: &CartKey) -> bool {
        self.size == key.size && self.color == key.color
    }
}

/// Merchandising badge derived from product tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    New,
    Sale,
    Bestseller,
}

impl Badge {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "sale" => Some(Self::Sale),
            "bestseller" => Some(Self::Bestseller),
            _ => None,
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: Money,
    pub status: ProductStatus,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Badges derived from tags, in tag order, without duplicates.
    #[must_use]
    pub fn badges(&self) -> Vec<Badge> {
        let mut badges = Vec::new();
        for badge in self.tags.iter().filter_map(|t| Badge::from_tag(t)) {
            if !badges.contains(&badge) {
                badges.push(badge);
            }
        }
        badges
    }

    /// Whether the product is listed in the storefront.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Look up the variant a cart key selects.
    ///
    /// A product without variants accepts only the option-less key.
    #[must_use]
    pub fn variant(&self, key: &CartKey) -> Option<&Variant> {
        self.variants.iter().find(|v| v.matches(key))
    }

    /// Whether a cart key names something this product sells.
    #[must_use]
    pub fn offers(&self, key: &CartKey) -> bool {
        if self.variants.is_empty() {
            key.size.is_none() && key.color.is_none()
        } else {
            self.variant(key).is_some()
        }
    }

    /// First image, used as the cart thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether the product matches a storefront filter (status excluded).
    #[must_use]
    pub fn matches(&self, filter: &ProductFilter) -> bool {
        let q_ok = filter.q.as_deref().is_none_or(|q| {
            self.title
                .to_lowercase()
                .contains(&q.trim().to_lowercase())
        });
        let tag_ok = filter
            .tag
            .as_deref()
            .is_none_or(|tag| self.tags.iter().any(|t| t == tag));
        let size_ok = filter
            .size
            .as_deref()
            .is_none_or(|size| self.variants.iter().any(|v| v.size.as_deref() == Some(size)));
        let color_ok = filter.color.as_deref().is_none_or(|color| {
            self.variants
                .iter()
                .any(|v| v.color.as_deref() == Some(color))
        });
        let min_ok = filter.min_price.is_none_or(|min| self.price >= min);
        let max_ok = filter.max_price.is_none_or(|max| self.price <= max);

        q_ok && tag_ok && size_ok && color_ok && min_ok && max_ok
    }
}

/// Storefront catalog filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Case-insensitive title substring.
    pub q: Option<String>,
    pub tag: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub pagination: Pagination,
}

/// Admin product creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// Admin product update payload. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub variants: Option<Vec<Variant>>,
}

impl ProductUpdate {
    /// Apply this update to a product in place.
    pub fn apply(self, product: &mut Product) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(tags) = self.tags {
            product.tags = tags;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(variants) = self.variants {
            product.variants = variants;
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(tags: &[&str], variants: Vec<Variant>) -> Product {
        Product {
            id: ProductId::new(1),
            slug: "field-tee".to_owned(),
            title: "Field Tee".to_owned(),
            description: String::new(),
            price: Money::new(Decimal::from(28)),
            status: ProductStatus::Active,
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            images: vec!["https://cdn.example.com/tee.jpg".to_owned()],
            variants,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(size: &str, color: &str) -> Variant {
        Variant {
            size: Some(size.to_owned()),
            color: Some(color.to_owned()),
            stock: 5,
        }
    }

    #[test]
    fn test_badges_from_tags() {
        let p = product(&["cotton", "Sale", "new", "sale"], vec![]);
        assert_eq!(p.badges(), vec![Badge::Sale, Badge::New]);
    }

    #[test]
    fn test_offers_variant_keys() {
        let p = product(&[], vec![variant("M", "black")]);
        let pid = ProductId::new(1);

        assert!(p.offers(&CartKey::new(pid, Some("M".into()), Some("black".into()))));
        assert!(!p.offers(&CartKey::new(pid, Some("L".into()), Some("black".into()))));
        assert!(!p.offers(&CartKey::new(pid, None, None)));
    }

    #[test]
    fn test_product_without_variants_offers_plain_key() {
        let p = product(&[], vec![]);
        assert!(p.offers(&CartKey::new(ProductId::new(1), None, None)));
        assert!(!p.offers(&CartKey::new(ProductId::new(1), Some("M".into()), None)));
    }

    #[test]
    fn test_filter_matching() {
        let p = product(&["sale"], vec![variant("M", "black")]);

        assert!(p.matches(&ProductFilter::default()));
        assert!(p.matches(&ProductFilter {
            q: Some("field".into()),
            size: Some("M".into()),
            ..ProductFilter::default()
        }));
        assert!(!p.matches(&ProductFilter {
            color: Some("white".into()),
            ..ProductFilter::default()
        }));
        assert!(!p.matches(&ProductFilter {
            max_price: Some(Money::new(Decimal::from(20))),
            ..ProductFilter::default()
        }));
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let mut p = product(&["new"], vec![]);
        ProductUpdate {
            title: Some("Field Tee II".into()),
            ..ProductUpdate::default()
        }
        .apply(&mut p);

        assert_eq!(p.title, "Field Tee II");
        assert_eq!(p.tags, vec!["new".to_owned()]);
    }
}
