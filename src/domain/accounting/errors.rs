//! Accounting service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AccountingServiceError {
    #[error("accounting entry not found")]
    EntryNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}
