//! Accounting

pub mod errors;
pub mod models;
pub mod service;

pub use errors::AccountingServiceError;
pub use service::*;
