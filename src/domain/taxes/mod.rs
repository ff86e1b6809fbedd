//! Taxes

pub mod cache;
pub mod calculator;
pub mod errors;
pub mod models;
pub mod service;

pub use errors::TaxesServiceError;
pub use service::*;
