//! Shipping Models

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::uuids::TypedUuid;

/// Shipping Rate UUID
pub type ShippingRateUuid = TypedUuid<ShippingRateRecord>;

/// A flat shipping rate for a destination country. Carrier integrations are
/// out of scope; rates are a per-tenant table.
#[derive(Debug, Clone)]
pub struct ShippingRateRecord {
    pub uuid: ShippingRateUuid,
    /// ISO country code, or `"*"` as a catch-all.
    pub country_code: String,
    pub amount: Decimal,
    /// Shipping is free at or above this subtotal.
    pub free_above: Option<Decimal>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Shipping Rate Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewShippingRate {
    pub uuid: ShippingRateUuid,
    pub country_code: String,
    pub amount: Decimal,
    pub free_above: Option<Decimal>,
}
