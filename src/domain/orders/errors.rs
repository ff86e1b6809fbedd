//! Orders service errors.

use thiserror::Error;

use crate::{domain::orders::models::OrderStatus, store::StoreError};

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("cart not found")]
    CartNotFound,

    #[error("cannot check out an empty cart")]
    EmptyCart,

    #[error("missing required address fields: {}", fields.join(", "))]
    InvalidAddress { fields: Vec<&'static str> },

    #[error("item {sku} is no longer available in the requested quantity")]
    ItemUnavailable { sku: String },

    #[error("coupon usage limit reached")]
    CouponExhausted,

    #[error("coupon per-user limit reached")]
    CouponPerUserLimitReached,

    #[error("order not found")]
    NotFound,

    #[error("illegal order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}
