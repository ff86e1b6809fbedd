//! Tenants

pub mod errors;
pub mod models;
pub mod service;

pub use errors::TenantsServiceError;
pub use service::*;
