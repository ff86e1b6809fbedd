//! Shipping rate resolution

use rust_decimal::Decimal;

use crate::domain::shipping::models::ShippingRateRecord;

/// Resolves the shipping amount for a destination and subtotal.
///
/// An exact country match beats the `"*"` catch-all; among equally specific
/// rates the cheapest wins. No configured rate means free shipping.
#[must_use]
pub fn resolve(rates: &[ShippingRateRecord], country_code: &str, subtotal: Decimal) -> Decimal {
    let pick = |wildcard: bool| {
        rates
            .iter()
            .filter(|rate| {
                if wildcard {
                    rate.country_code == "*"
                } else {
                    rate.country_code.eq_ignore_ascii_case(country_code)
                }
            })
            .map(|rate| effective_amount(rate, subtotal))
            .min()
    };

    pick(false).or_else(|| pick(true)).unwrap_or(Decimal::ZERO)
}

fn effective_amount(rate: &ShippingRateRecord, subtotal: Decimal) -> Decimal {
    if rate.free_above.is_some_and(|threshold| subtotal >= threshold) {
        Decimal::ZERO
    } else {
        rate.amount
    }
}
