//! Coupons

pub mod errors;
pub mod evaluator;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::CouponsServiceError;
pub use service::*;
