//! Order Models

use std::fmt;

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        carts::models::{CartOwner, CartUuid, Destination},
        coupons::models::CouponSnapshot,
        payments::models::PaymentMethod,
        products::models::{ProductSnapshot, ProductUuid, StockTarget, VariantUuid},
    },
    money::CurrencyCode,
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Order Item UUID
pub type OrderItemUuid = TypedUuid<OrderItemRecord>;

/// Fulfilment status. Transitions are closed under
/// [`OrderStatus::can_transition_to`]; `Cancelled` and `Refunded` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Whether moving from this status to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::{
            Cancelled, Confirmed, Delivered, Pending, Processing, Refunded, Shipped,
        };

        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed, Cancelled)
                | (Confirmed | Processing | Shipped | Delivered, Refunded)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };

        f.write_str(name)
    }
}

/// Where the order stands with respect to money collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// A postal address as submitted at checkout, stored verbatim on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country_code: String,
    pub phone: Option<String>,
}

impl Address {
    /// The required fields that are empty, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();

        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.line1.trim().is_empty() {
            missing.push("line1");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }
        if self.country_code.trim().is_empty() {
            missing.push("country_code");
        }

        missing
    }

    /// The tax/shipping destination this address implies.
    #[must_use]
    pub fn destination(&self) -> Destination {
        Destination {
            country_code: self.country_code.clone(),
            state: self.state.clone(),
            postal_code: Some(self.postal_code.clone()),
            city: Some(self.city.clone()),
        }
    }
}

/// The order aggregate. Every monetary field and every item snapshot is
/// frozen at checkout; only the status fields move afterwards.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    /// Human-facing reference, unique per tenant.
    pub number: String,
    pub placed_by: CartOwner,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub coupon: Option<CouponSnapshot>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
    pub items: Vec<OrderItemRecord>,
    pub placed_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One frozen order line, copied verbatim from the cart line it came from.
#[derive(Debug, Clone)]
pub struct OrderItemRecord {
    pub uuid: OrderItemUuid,
    pub product_uuid: ProductUuid,
    pub variant_uuid: Option<VariantUuid>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub product: ProductSnapshot,
}

impl OrderItemRecord {
    /// The stock row this line reserved from.
    #[must_use]
    pub fn stock_target(&self) -> StockTarget {
        match self.variant_uuid {
            Some(variant) => StockTarget::Variant(variant),
            None => StockTarget::Product(self.product_uuid),
        }
    }
}

/// Everything the caller submits to convert a cart into an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub cart_uuid: CartUuid,
    pub shipping_address: Address,
    /// Defaults to the shipping address when omitted.
    pub billing_address: Option<Address>,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}
