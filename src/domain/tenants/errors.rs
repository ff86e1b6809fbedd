//! Tenants service errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TenantsServiceError {
    #[error("tenant already exists")]
    AlreadyExists,

    #[error("tenant not found")]
    NotFound,

    #[error("exchange rate must be positive")]
    InvalidExchangeRate,
}

impl From<StoreError> for TenantsServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UnknownTenant(_) => Self::NotFound,
            StoreError::TenantAlreadyRegistered(_) => Self::AlreadyExists,
        }
    }
}
