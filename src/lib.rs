//! Tally
//!
//! A multi-tenant storefront checkout, pricing and order engine: cart
//! aggregates, coupon evaluation, tax assessment, shipping rates, the atomic
//! checkout transaction, payment processing through a gateway port, and an
//! append-only accounting ledger.

pub mod context;
pub mod domain;
pub mod money;
pub mod store;

#[cfg(test)]
mod test;

mod uuids;

pub use uuids::TypedUuid;
