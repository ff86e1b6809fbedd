//! Domain modules.

pub mod accounting;
pub mod carts;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;
pub mod taxes;
pub mod tenants;
