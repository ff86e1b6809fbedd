//! Taxes service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TaxesServiceError {
    #[error("tax rate must not be negative")]
    NegativeRate,

    #[error(transparent)]
    Store(#[from] StoreError),
}
