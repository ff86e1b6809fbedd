//! Carts

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;
pub(crate) mod totals;

pub use errors::{CartsServiceError, CouponRejection};
pub use service::*;
