//! Shipping cost policy.
//!
//! The same policy is used to quote shipping to the browser and to compute
//! the amount actually charged at order creation. The server never accepts a
//! client-supplied shipping cost; it recomputes it here from its own
//! subtotal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::types::Money;

/// Errors returned by [`ShippingPolicy::shipping_cost`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// Shipping is only defined for a positive subtotal.
    #[error("subtotal must be greater than zero (got {0})")]
    NonPositiveSubtotal(Money),
}

/// Shipping method selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    /// Flat-rate shipping.
    #[default]
    Standard,
    /// Faster shipping, free above the threshold.
    Express,
}

impl ShippingMethod {
    /// Lowercase text form, as stored on orders.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
        }
    }
}

impl std::fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            other => Err(format!("unknown shipping method: {other}")),
        }
    }
}

/// Shipping tiers and the free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Cost of standard shipping, regardless of subtotal.
    pub standard_cost: Money,
    /// Cost of express shipping below the threshold.
    pub express_cost: Money,
    /// Subtotal at or above which express shipping is free.
    pub free_shipping_threshold: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            standard_cost: Money::new(Decimal::new(500, 2)),
            express_cost: Money::new(Decimal::new(1500, 2)),
            free_shipping_threshold: Money::new(Decimal::new(5000, 2)),
        }
    }
}

impl ShippingPolicy {
    /// Compute the shipping cost for a subtotal and method.
    ///
    /// - `Standard` is always `standard_cost`.
    /// - `Express` is zero when `subtotal >= free_shipping_threshold`,
    ///   otherwise `express_cost`. The threshold itself qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::NonPositiveSubtotal`] for a zero or negative
    /// subtotal.
    pub fn shipping_cost(
        &self,
        subtotal: Money,
        method: ShippingMethod,
    ) -> Result<Money, PricingError> {
        if !subtotal.is_positive() {
            return Err(PricingError::NonPositiveSubtotal(subtotal));
        }

        Ok(match method {
            ShippingMethod::Standard => self.standard_cost,
            ShippingMethod::Express if subtotal >= self.free_shipping_threshold => Money::ZERO,
            ShippingMethod::Express => self.express_cost,
        })
    }

    /// How much more the customer must spend for free express shipping.
    #[must_use]
    pub fn remaining_for_free_shipping(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            Money::ZERO
        } else {
            Money::new(self.free_shipping_threshold.amount() - subtotal.amount())
        }
    }
}

/// Sum of `unit_price * quantity` over the given lines.
#[must_use]
pub fn subtotal(lines: &[CartLine]) -> Money {
    lines
        .iter()
        .map(|line| line.unit_price.times(line.quantity))
        .sum()
}
