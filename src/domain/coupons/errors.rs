//! Coupons service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CouponsServiceError {
    #[error("coupon code already exists")]
    AlreadyExists,

    #[error("coupon not found")]
    NotFound,

    #[error("coupon value must be positive")]
    InvalidValue,

    #[error("percentage coupons cannot exceed 100")]
    PercentageOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of the conditional usage increment, surfaced by checkout as a
/// business-rule rejection.
#[derive(Debug, Error)]
pub(crate) enum UsageError {
    #[error("coupon not found")]
    NotFound,

    #[error("coupon usage limit reached")]
    Exhausted,
}
