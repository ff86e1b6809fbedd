//! Payments

pub mod errors;
pub mod gateway;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::PaymentsServiceError;
pub use gateway::{GatewayError, PaymentGateway, SimulatedGateway};
pub use service::*;
