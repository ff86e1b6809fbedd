//! Shipping

pub mod errors;
pub mod models;
pub mod resolver;
pub mod service;

pub use errors::ShippingServiceError;
pub use service::*;
