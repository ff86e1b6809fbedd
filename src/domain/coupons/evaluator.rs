//! Coupon evaluation
//!
//! Pure functions deriving coupon validity and discount amounts. Nothing
//! here touches storage; the atomic usage increment lives in the
//! repository so it can run under the checkout transaction.

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    domain::{
        coupons::models::{CouponKind, CouponRecord},
        products::models::ProductRecord,
    },
    money::round_money,
};

/// Whether the coupon is redeemable at all: active, inside its time window,
/// and not globally exhausted.
#[must_use]
pub fn is_valid(coupon: &CouponRecord, at: Timestamp) -> bool {
    coupon.is_active
        && coupon.starts_at.is_none_or(|starts| starts <= at)
        && coupon.expires_at.is_none_or(|expires| expires > at)
        && coupon
            .usage_limit
            .is_none_or(|limit| coupon.used_count < limit)
}

/// [`is_valid`] plus the minimum-amount gate.
#[must_use]
pub fn is_valid_for_amount(coupon: &CouponRecord, amount: Decimal, at: Timestamp) -> bool {
    is_valid(coupon, at)
        && coupon
            .minimum_amount
            .is_none_or(|minimum| amount >= minimum)
}

/// The discount a coupon's terms produce against `amount`. A fixed coupon
/// never discounts more than the amount itself.
#[must_use]
pub fn discount_amount(kind: CouponKind, value: Decimal, amount: Decimal) -> Decimal {
    match kind {
        CouponKind::Fixed => value.min(amount),
        CouponKind::Percentage => round_money(amount * value / Decimal::ONE_HUNDRED),
    }
}

/// Whether the coupon covers the given product. Absent product and category
/// restrictions mean it applies to everything.
#[must_use]
pub fn is_applicable_to(coupon: &CouponRecord, product: &ProductRecord) -> bool {
    let (products, categories) = match (
        coupon.applicable_products.as_deref(),
        coupon.applicable_categories.as_deref(),
    ) {
        (None, None) => return true,
        (products, categories) => (
            products.unwrap_or_default(),
            categories.unwrap_or_default(),
        ),
    };

    products.contains(&product.uuid)
        || product
            .categories
            .iter()
            .any(|category| categories.contains(category))
}
