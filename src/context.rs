//! Application context
//!
//! Wires every service behind its trait so callers (and tests) depend only
//! on the ports.

use std::{sync::Arc, time::Duration};

use jiff::SignedDuration;

use crate::{
    domain::{
        accounting::service::{AccountingService, MemAccountingService},
        carts::service::{CartsService, MemCartsService},
        coupons::service::{CouponsService, MemCouponsService},
        orders::service::{MemOrdersService, OrdersService},
        payments::{
            gateway::PaymentGateway,
            service::{MemPaymentsService, PaymentsService},
        },
        products::service::{MemProductsService, ProductsService},
        shipping::service::{MemShippingService, ShippingService},
        taxes::{
            cache::{InMemoryTaxCache, TaxCache},
            service::{MemTaxesService, TaxesService},
        },
        tenants::service::{MemTenantsService, TenantsService},
    },
    money::CurrencyCode,
    store::Db,
};

/// Tunables injected at construction time.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Upper bound on any single gateway call.
    pub gateway_timeout: Duration,
    /// How long a tax quote stays servable from cache.
    pub tax_cache_ttl: SignedDuration,
    /// Currency assigned to tenants that do not specify one.
    pub default_currency: CurrencyCode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(10),
            tax_cache_ttl: SignedDuration::from_mins(5),
            default_currency: CurrencyCode::usd(),
        }
    }
}

/// The assembled application: one handle per service port.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub tenants: Arc<dyn TenantsService>,
    pub products: Arc<dyn ProductsService>,
    pub coupons: Arc<dyn CouponsService>,
    pub taxes: Arc<dyn TaxesService>,
    pub shipping: Arc<dyn ShippingService>,
    pub carts: Arc<dyn CartsService>,
    pub orders: Arc<dyn OrdersService>,
    pub payments: Arc<dyn PaymentsService>,
    pub accounting: Arc<dyn AccountingService>,
}

impl AppContext {
    #[must_use]
    pub fn new(db: Db, gateway: Arc<dyn PaymentGateway>, config: AppConfig) -> Self {
        let accounting = Arc::new(MemAccountingService::new(db.clone()));
        let tax_cache: Arc<dyn TaxCache> =
            Arc::new(InMemoryTaxCache::new(config.tax_cache_ttl));

        Self {
            tenants: Arc::new(MemTenantsService::new(db.clone())),
            products: Arc::new(MemProductsService::new(db.clone())),
            coupons: Arc::new(MemCouponsService::new(db.clone())),
            taxes: Arc::new(MemTaxesService::new(db.clone(), tax_cache.clone())),
            shipping: Arc::new(MemShippingService::new(db.clone())),
            carts: Arc::new(MemCartsService::new(db.clone(), tax_cache.clone())),
            orders: Arc::new(MemOrdersService::new(
                db.clone(),
                accounting.clone(),
                tax_cache,
            )),
            payments: Arc::new(MemPaymentsService::new(
                db,
                gateway,
                accounting.clone(),
                config.gateway_timeout,
            )),
            accounting,
            config,
        }
    }
}
