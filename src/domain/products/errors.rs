//! Products service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProductsServiceError {
    #[error("product already exists")]
    AlreadyExists,

    #[error("product not found")]
    NotFound,

    #[error("price must not be negative")]
    NegativePrice,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a conditional stock mutation. Only meaningful inside a
/// transaction; the caller decides how to surface it.
#[derive(Debug, Error)]
pub(crate) enum StockError {
    #[error("stock target not found")]
    NotFound,

    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: u32, requested: u32 },
}
