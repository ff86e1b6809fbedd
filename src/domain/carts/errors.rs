//! Carts service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CartsServiceError {
    #[error("cart already exists")]
    AlreadyExists,

    #[error("cart not found")]
    NotFound,

    #[error("cart item not found")]
    ItemNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("variant not found")]
    VariantNotFound,

    #[error("product is priced in a different currency than the cart")]
    CurrencyMismatch,

    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("coupon rejected: {0}")]
    CouponRejected(#[source] CouponRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a coupon could not be applied to a cart.
#[derive(Debug, Error)]
pub enum CouponRejection {
    #[error("no such coupon")]
    NotFound,

    #[error("coupon is not currently redeemable")]
    NotRedeemable,

    #[error("cart subtotal is below the coupon minimum")]
    BelowMinimum,

    #[error("coupon does not apply to any item in the cart")]
    NotApplicable,
}
