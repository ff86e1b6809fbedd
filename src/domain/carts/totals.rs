//! Cart totals
//!
//! The single place cart amounts are derived. Every cart mutation funnels
//! through [`recalculate`] before the cart is persisted, so the stored
//! totals are always consistent with the line items, the applied coupon and
//! the destination.

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    domain::{
        carts::models::CartRecord,
        coupons::{evaluator, models::CouponRecord},
        taxes::{
            cache::{TaxCache, TaxCacheKey},
            calculator,
            models::{TaxQuery, TaxTreatment},
        },
        shipping::resolver,
    },
    money::non_negative,
    store::TenantTransaction,
};

/// Recomputes every derived amount on the cart from its current lines.
///
/// The discount is re-derived against the live coupon each time: if the
/// coupon has since been deactivated, exhausted, stopped covering any line
/// or the subtotal dropped below its minimum, the discount collapses to
/// zero while the snapshot stays on the cart. The snapshot's own terms
/// (kind, value) are what price the discount, so later coupon edits never
/// change an open cart. Tax lookups go through the shared quote cache.
pub(crate) fn recalculate(
    tx: &TenantTransaction,
    tax_cache: &dyn TaxCache,
    cart: &mut CartRecord,
    now: Timestamp,
) {
    let state = tx.state();

    cart.subtotal = cart
        .items
        .iter()
        .map(|item| item.total_price)
        .sum::<Decimal>();

    cart.discount_amount = match &cart.coupon {
        Some(snapshot) => state
            .coupons
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(&snapshot.code))
            .filter(|live| {
                evaluator::is_valid_for_amount(live, cart.subtotal, now)
                    && coupon_covers_cart(tx, cart, live)
            })
            .map_or(Decimal::ZERO, |_| {
                evaluator::discount_amount(snapshot.kind, snapshot.value, cart.subtotal)
            }),
        None => Decimal::ZERO,
    };

    // Tax is assessed on the discounted subtotal.
    let taxable = non_negative(cart.subtotal - cart.discount_amount);

    let (tax_amount, tax_included_in_prices) = match &cart.destination {
        Some(destination) if taxable > Decimal::ZERO => {
            let treatment = if state
                .tax_inclusive_countries
                .contains(&destination.country_code.to_ascii_uppercase())
            {
                TaxTreatment::Inclusive
            } else {
                TaxTreatment::Exclusive
            };

            let mut query = TaxQuery::for_amount(&destination.country_code, taxable);
            query.state = destination.state.clone();
            query.postal_code = destination.postal_code.clone();
            query.city = destination.city.clone();
            query.category_uuids = line_categories(tx, cart);

            let key = TaxCacheKey { query, treatment };

            let assessment = match tax_cache.get(&key, now) {
                Some(cached) => cached,
                None => {
                    let assessment =
                        calculator::assess(&state.tax_rules, &key.query, treatment, now);
                    tax_cache.put(key, assessment.clone(), now);
                    assessment
                }
            };

            (
                assessment.total_tax,
                treatment == TaxTreatment::Inclusive,
            )
        }
        _ => (Decimal::ZERO, false),
    };

    cart.tax_amount = tax_amount;

    cart.shipping_amount = match &cart.destination {
        Some(destination) => resolver::resolve(
            &state.shipping_rates,
            &destination.country_code,
            cart.subtotal,
        ),
        None => Decimal::ZERO,
    };

    // Inclusive-pricing tax is already inside the line prices, so it is
    // reported but not added again.
    let tax_added = if tax_included_in_prices {
        Decimal::ZERO
    } else {
        cart.tax_amount
    };

    cart.total = non_negative(cart.subtotal + tax_added + cart.shipping_amount - cart.discount_amount);
    cart.updated_at = now;
}

/// Whether the coupon's product and category restrictions cover at least
/// one line in the cart, judged against the live catalog. An unrestricted
/// coupon covers every cart.
pub(crate) fn coupon_covers_cart(
    tx: &TenantTransaction,
    cart: &CartRecord,
    coupon: &CouponRecord,
) -> bool {
    if coupon.applicable_products.is_none() && coupon.applicable_categories.is_none() {
        return true;
    }

    cart.items.iter().any(|item| {
        tx.state()
            .products
            .get(&item.product_uuid)
            .is_some_and(|product| evaluator::is_applicable_to(coupon, product))
    })
}

/// The distinct categories across the live products behind the cart lines.
/// Lines whose product has since been deleted contribute nothing.
fn line_categories(
    tx: &TenantTransaction,
    cart: &CartRecord,
) -> Vec<crate::domain::products::models::CategoryUuid> {
    let mut categories: Vec<_> = cart
        .items
        .iter()
        .filter_map(|item| tx.state().products.get(&item.product_uuid))
        .flat_map(|product| product.categories.iter().copied())
        .collect();

    categories.sort();
    categories.dedup();

    categories
}
