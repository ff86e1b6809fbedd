//! Cart Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        coupons::models::CouponSnapshot,
        products::models::{ProductSnapshot, ProductUuid, StockTarget, VariantUuid},
    },
    money::CurrencyCode,
    uuids::TypedUuid,
};

/// Cart UUID
pub type CartUuid = TypedUuid<CartRecord>;

/// Cart Item UUID
pub type CartItemUuid = TypedUuid<CartItemRecord>;

/// Marker for authenticated shoppers.
#[derive(Debug, Clone, Copy)]
pub struct Customer;

/// Customer UUID
pub type CustomerUuid = TypedUuid<Customer>;

/// Marker for anonymous browsing sessions.
#[derive(Debug, Clone, Copy)]
pub struct Session;

/// Session UUID
pub type SessionUuid = TypedUuid<Session>;

/// A cart belongs to exactly one of an authenticated customer or an
/// anonymous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    Customer(CustomerUuid),
    Session(SessionUuid),
}

impl CartOwner {
    /// The customer behind this owner, when it is not anonymous.
    #[must_use]
    pub fn customer(&self) -> Option<CustomerUuid> {
        match self {
            Self::Customer(uuid) => Some(*uuid),
            Self::Session(_) => None,
        }
    }
}

/// Where a cart will ship, used for tax and shipping-rate resolution before
/// checkout captures the full address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub country_code: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

impl Destination {
    #[must_use]
    pub fn country(country_code: &str) -> Self {
        Self {
            country_code: country_code.to_string(),
            state: None,
            postal_code: None,
            city: None,
        }
    }
}

/// The cart aggregate: line items plus derived totals, all owned by one
/// shopper. Totals are recomputed and persisted on every mutation.
#[derive(Debug, Clone)]
pub struct CartRecord {
    pub uuid: CartUuid,
    pub owner: CartOwner,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    /// Applied coupon terms, denormalized at application time.
    pub coupon: Option<CouponSnapshot>,
    pub destination: Option<Destination>,
    pub items: Vec<CartItemRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CartRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finds the line for a (product, variant) pair, if present.
    #[must_use]
    pub fn find_item(
        &self,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.product_uuid == product && item.variant_uuid == variant)
    }
}

/// One cart line. `unit_price` is snapshotted when the line is created and
/// never recomputed from the live product price.
#[derive(Debug, Clone)]
pub struct CartItemRecord {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub variant_uuid: Option<VariantUuid>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub product: ProductSnapshot,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CartItemRecord {
    /// The stock row this line draws from.
    #[must_use]
    pub fn stock_target(&self) -> StockTarget {
        match self.variant_uuid {
            Some(variant) => StockTarget::Variant(variant),
            None => StockTarget::Product(self.product_uuid),
        }
    }
}

/// New Cart Model
#[derive(Debug, Clone)]
pub struct NewCart {
    pub uuid: CartUuid,
    pub owner: CartOwner,
    /// Defaults to the tenant's currency when unset.
    pub currency: Option<CurrencyCode>,
}

/// New Cart Item Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub variant_uuid: Option<VariantUuid>,
    pub quantity: u32,
}
