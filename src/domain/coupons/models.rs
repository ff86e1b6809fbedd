//! Coupon Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        carts::models::CustomerUuid,
        orders::models::OrderUuid,
        products::models::{CategoryUuid, ProductUuid},
    },
    uuids::TypedUuid,
};

/// Coupon UUID
pub type CouponUuid = TypedUuid<CouponRecord>;

/// How a coupon's value translates into a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// `value` is an absolute amount, capped at the amount being discounted.
    Fixed,
    /// `value` is a percentage of the amount being discounted.
    Percentage,
}

/// A redeemable discount code. Validity is always derived, never stored.
#[derive(Debug, Clone)]
pub struct CouponRecord {
    pub uuid: CouponUuid,
    pub code: String,
    pub name: String,
    pub kind: CouponKind,
    pub value: Decimal,
    /// Smallest cart subtotal the coupon applies to.
    pub minimum_amount: Option<Decimal>,
    /// Total redemptions allowed across all shoppers; None is unlimited.
    pub usage_limit: Option<u32>,
    pub usage_limit_per_user: Option<u32>,
    /// Monotonic redemption counter, incremented only inside the checkout
    /// transaction.
    pub used_count: u32,
    pub starts_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub is_active: bool,
    /// None applies to all products.
    pub applicable_products: Option<Vec<ProductUuid>>,
    /// None applies to all categories.
    pub applicable_categories: Option<Vec<CategoryUuid>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Coupon Model
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub uuid: CouponUuid,
    pub code: String,
    pub name: String,
    pub kind: CouponKind,
    pub value: Decimal,
    pub minimum_amount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub usage_limit_per_user: Option<u32>,
    pub starts_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub applicable_products: Option<Vec<ProductUuid>>,
    pub applicable_categories: Option<Vec<CategoryUuid>>,
}

/// The terms of a coupon as they stood when it was applied to a cart,
/// denormalized so later coupon edits cannot retroactively change an open
/// cart's applied terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponSnapshot {
    pub code: String,
    pub name: String,
    pub kind: CouponKind,
    pub value: Decimal,
}

impl CouponSnapshot {
    #[must_use]
    pub fn capture(coupon: &CouponRecord) -> Self {
        Self {
            code: coupon.code.clone(),
            name: coupon.name.clone(),
            kind: coupon.kind,
            value: coupon.value,
        }
    }
}

/// One successful redemption, written in the same transaction as the order
/// it belongs to. This is what makes per-user limits exact under
/// concurrency.
#[derive(Debug, Clone)]
pub struct CouponRedemptionRecord {
    pub coupon_uuid: CouponUuid,
    pub customer_uuid: CustomerUuid,
    pub order_uuid: OrderUuid,
    pub redeemed_at: Timestamp,
}
