//! Checkout submission parsing.
//!
//! [`CheckoutSubmission`] is the raw client payload. [`CheckoutSubmission::validate`]
//! turns it into a [`ValidatedCheckout`] or a specific [`CheckoutError`]
//! before anything touches the catalog or the database.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use threadline_core::{CartKey, CartLine, Email, ProductId, ShippingMethod, UserId};

use super::CheckoutError;
use crate::models::ShippingAddress;

/// Raw checkout payload as posted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSubmission {
    #[serde(default)]
    pub items: Vec<SubmittedLine>,
    #[serde(default)]
    pub customer: SubmittedCustomer,
    #[serde(default)]
    pub shipping: SubmittedShipping,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedLine {
    #[serde(alias = "product_id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(alias = "quantity")]
    pub qty: i64,
    /// Client-side price, checked for sign only. The catalog price is charged.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedCustomer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: SubmittedAddress,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "state")]
    pub region: Option<String>,
    #[serde(default, alias = "postal_code", alias = "zip")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmittedShipping {
    #[serde(default)]
    pub method: Option<String>,
    /// Ignored; shipping is always recomputed.
    #[serde(default)]
    pub cost: Option<Decimal>,
}

/// A requested line: key and quantity, not yet priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLine {
    pub key: CartKey,
    pub quantity: u32,
}

/// A submission that passed schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    pub user_id: Option<UserId>,
    pub email: Email,
    pub lines: Vec<RequestedLine>,
    pub address: ShippingAddress,
    pub method: ShippingMethod,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, CheckoutError> {
    non_blank(value).ok_or(CheckoutError::AddressIncomplete(field))
}

impl CheckoutSubmission {
    /// Validate the payload.
    ///
    /// `session_email` is the signed-in user's email, used when the form
    /// leaves the email blank.
    ///
    /// # Errors
    ///
    /// Returns the first failing check, in order: empty cart, email,
    /// lines, address, shipping method.
    pub fn validate(
        &self,
        user_id: Option<UserId>,
        session_email: Option<&Email>,
    ) -> Result<ValidatedCheckout, CheckoutError> {
        if self.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let email = match non_blank(self.customer.email.as_ref()) {
            Some(raw) => Email::parse(&raw)?,
            None => session_email.cloned().ok_or(CheckoutError::EmailRequired)?,
        };

        let lines = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| item.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let address = self.address()?;

        let method = match non_blank(self.shipping.method.as_ref()) {
            Some(raw) => raw
                .parse::<ShippingMethod>()
                .map_err(CheckoutError::InvalidShippingMethod)?,
            None => ShippingMethod::Standard,
        };

        Ok(ValidatedCheckout {
            user_id,
            email,
            lines,
            address,
            method,
        })
    }

    fn address(&self) -> Result<ShippingAddress, CheckoutError> {
        let customer = &self.customer;
        let address = &customer.address;

        let name = [&customer.first_name, &customer.last_name]
            .into_iter()
            .filter_map(|part| non_blank(part.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            return Err(CheckoutError::AddressIncomplete("name"));
        }

        Ok(ShippingAddress {
            name,
            line1: required(address.line1.as_ref(), "line1")?,
            line2: non_blank(address.line2.as_ref()),
            city: required(address.city.as_ref(), "city")?,
            region: non_blank(address.region.as_ref()),
            postal_code: required(address.postal_code.as_ref(), "postal_code")?,
            country: required(address.country.as_ref(), "country")?,
            phone: non_blank(customer.phone.as_ref()),
        })
    }
}

impl SubmittedLine {
    fn validate(&self, index: usize) -> Result<RequestedLine, CheckoutError> {
        let invalid = |reason: &str| CheckoutError::InvalidLine {
            index,
            reason: reason.to_owned(),
        };

        if self.qty < 1 {
            return Err(invalid("quantity must be positive"));
        }
        let quantity = u32::try_from(self.qty)
            .ok()
            .filter(|q| *q <= threadline_core::MAX_LINE_QUANTITY)
            .ok_or_else(|| invalid("quantity too large"))?;

        if self.price.is_some_and(|p| p <= Decimal::ZERO) {
            return Err(invalid("price must be positive"));
        }

        Ok(RequestedLine {
            key: CartKey::new(self.product_id, self.size.clone(), self.color.clone()),
            quantity,
        })
    }
}

/// Canonical form of a priced checkout, hashed for idempotency.
#[derive(Serialize)]
struct HashInput<'a> {
    user_id: Option<i32>,
    email: String,
    method: &'static str,
    address: &'a ShippingAddress,
    /// Sorted by key so line order does not matter.
    lines: Vec<(i32, &'a str, &'a str, u32, String)>,
}

/// Hex SHA-256 of the normalized checkout.
///
/// Two submissions with the same owner, email, address, method and priced
/// lines (in any order) hash identically.
#[must_use]
pub fn cart_hash(checkout: &ValidatedCheckout, lines: &[CartLine]) -> String {
    let mut normalized: Vec<_> = lines
        .iter()
        .map(|line| {
            (
                line.key.product_id.as_i32(),
                line.key.size.as_deref().unwrap_or(""),
                line.key.color.as_deref().unwrap_or(""),
                line.quantity,
                line.unit_price.to_string(),
            )
        })
        .collect();
    normalized.sort();

    let input = HashInput {
        user_id: checkout.user_id.map(|id| id.as_i32()),
        email: checkout.email.as_str().to_lowercase(),
        method: checkout.method.as_str(),
        address: &checkout.address,
        lines: normalized,
    };

    // Serializing plain strings and integers cannot fail.
    let bytes = serde_json::to_vec(&input).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
