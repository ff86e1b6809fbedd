//! Tenant Models

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{money::CurrencyCode, uuids::TypedUuid};

/// Tenant UUID
pub type TenantUuid = TypedUuid<TenantRecord>;

/// One registered storefront.
#[derive(Debug, Clone)]
pub struct TenantRecord {
    /// Unique tenant identifier.
    pub uuid: TenantUuid,

    /// Human-readable tenant name.
    pub name: String,

    /// Currency used when a cart does not specify one.
    pub default_currency: CurrencyCode,

    /// Tenant creation timestamp.
    pub created_at: Timestamp,

    /// Last update timestamp.
    pub updated_at: Timestamp,
}

/// New Tenant Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewTenant {
    pub uuid: TenantUuid,
    pub name: String,
    pub default_currency: CurrencyCode,
}

/// An exchange rate into the tenant's reporting currency, captured on
/// accounting entries at post time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    pub currency: CurrencyCode,
    pub rate: Decimal,
}
