//! Shipping service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ShippingServiceError {
    #[error("shipping amount must not be negative")]
    NegativeAmount,

    #[error(transparent)]
    Store(#[from] StoreError),
}
