//! Seed the catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - slug: field-tee
//!   title: Field tee
//!   price: "28.00"
//!   tags: [new]
//!   images: [https://cdn.example.com/field-tee.jpg]
//!   variants:
//!     - { size: M, color: black, stock: 12 }
//! ```
//!
//! Products whose slug already exists are skipped, so the command can be
//! re-run after editing the file.

use std::path::Path;

use tracing::{error, info};

use threadline_storefront::db::Stores;
use threadline_storefront::models::NewProduct;

use super::connect;

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or database operations fail.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let products: Vec<NewProduct> = serde_yaml::from_str(&content)?;
    info!(products = products.len(), "Parsed file");

    let errors = validate(&products);
    if !errors.is_empty() {
        error!("Validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let stores = Stores::postgres(connect().await?);

    let mut inserted = 0;
    let mut skipped = 0;
    for product in products {
        if stores.products.get_by_slug(&product.slug).await?.is_some() {
            skipped += 1;
            continue;
        }
        stores.products.create(product).await?;
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (slug exists): {skipped}");
    Ok(())
}

fn validate(products: &[NewProduct]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (i, product) in products.iter().enumerate() {
        let label = format!("#{} ({})", i + 1, product.slug);
        if product.slug.trim().is_empty() {
            errors.push(format!("{label}: slug is required"));
        }
        if !seen.insert(product.slug.as_str()) {
            errors.push(format!("{label}: duplicate slug"));
        }
        if product.title.trim().is_empty() {
            errors.push(format!("{label}: title is required"));
        }
        if !product.price.is_positive() {
            errors.push(format!("{label}: price must be positive"));
        }
        if product.variants.iter().any(|v| v.stock < 0) {
            errors.push(format!("{label}: stock must not be negative"));
        }
    }

    errors
}
