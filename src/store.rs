//! Storage engine
//!
//! An embedded, per-tenant transactional store. Each tenant owns a disjoint
//! state partition; a [`TenantTransaction`] takes the partition's lock,
//! works on a private copy, and swaps it in on commit. Dropping a
//! transaction without committing discards every write, so the transaction
//! boundary is also the rollback boundary. Transactions are serializable
//! per tenant, which is what lets conditional updates (stock decrements,
//! coupon usage increments) re-check their guards safely.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    domain::{
        accounting::models::AccountingEntryRecord,
        carts::models::{CartRecord, CartUuid},
        coupons::models::{CouponRecord, CouponRedemptionRecord, CouponUuid},
        orders::models::{OrderRecord, OrderUuid},
        payments::models::{PaymentRecord, PaymentUuid},
        products::models::{ProductRecord, ProductUuid, VariantRecord, VariantUuid},
        shipping::models::ShippingRateRecord,
        taxes::models::TaxRuleRecord,
        tenants::models::{TenantRecord, TenantUuid},
    },
    money::CurrencyCode,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown tenant {0}")]
    UnknownTenant(TenantUuid),

    #[error("tenant {0} already registered")]
    TenantAlreadyRegistered(TenantUuid),
}

/// All durable state belonging to one tenant.
#[derive(Debug, Clone)]
pub struct TenantState {
    pub(crate) tenant: TenantRecord,
    pub(crate) products: FxHashMap<ProductUuid, ProductRecord>,
    pub(crate) variants: FxHashMap<VariantUuid, VariantRecord>,
    pub(crate) carts: FxHashMap<CartUuid, CartRecord>,
    pub(crate) coupons: FxHashMap<CouponUuid, CouponRecord>,
    pub(crate) redemptions: Vec<CouponRedemptionRecord>,
    pub(crate) orders: FxHashMap<OrderUuid, OrderRecord>,
    pub(crate) payments: FxHashMap<PaymentUuid, PaymentRecord>,
    pub(crate) tax_rules: Vec<TaxRuleRecord>,
    pub(crate) tax_inclusive_countries: FxHashSet<String>,
    pub(crate) shipping_rates: Vec<ShippingRateRecord>,
    pub(crate) exchange_rates: FxHashMap<CurrencyCode, Decimal>,
    pub(crate) ledger: Vec<AccountingEntryRecord>,
}

impl TenantState {
    fn new(tenant: TenantRecord) -> Self {
        Self {
            tenant,
            products: FxHashMap::default(),
            variants: FxHashMap::default(),
            carts: FxHashMap::default(),
            coupons: FxHashMap::default(),
            redemptions: Vec::new(),
            orders: FxHashMap::default(),
            payments: FxHashMap::default(),
            tax_rules: Vec::new(),
            tax_inclusive_countries: FxHashSet::default(),
            shipping_rates: Vec::new(),
            exchange_rates: FxHashMap::default(),
            ledger: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Db {
    tenants: Arc<StdMutex<FxHashMap<TenantUuid, Arc<Mutex<TenantState>>>>>,
}

impl Db {
    /// Opens an empty store.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Registers a tenant, creating its empty state partition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TenantAlreadyRegistered`] when the tenant uuid
    /// is taken.
    pub fn register_tenant(&self, tenant: TenantRecord) -> Result<(), StoreError> {
        let mut tenants = self
            .tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if tenants.contains_key(&tenant.uuid) {
            return Err(StoreError::TenantAlreadyRegistered(tenant.uuid));
        }

        let uuid = tenant.uuid;
        tenants.insert(uuid, Arc::new(Mutex::new(TenantState::new(tenant))));

        Ok(())
    }

    /// Begin a serializable transaction over one tenant's state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTenant`] when the tenant is not
    /// registered.
    pub async fn begin_tenant_transaction(
        &self,
        tenant: TenantUuid,
    ) -> Result<TenantTransaction, StoreError> {
        let cell = {
            let tenants = self
                .tenants
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            tenants
                .get(&tenant)
                .cloned()
                .ok_or(StoreError::UnknownTenant(tenant))?
        };

        let guard = cell.lock_owned().await;
        let working = guard.clone();

        Ok(TenantTransaction { guard, working })
    }
}

/// An open transaction. Reads and writes go to a working copy; nothing is
/// visible to other transactions until [`TenantTransaction::commit`].
#[derive(Debug)]
pub struct TenantTransaction {
    guard: OwnedMutexGuard<TenantState>,
    working: TenantState,
}

impl TenantTransaction {
    pub(crate) fn state(&self) -> &TenantState {
        &self.working
    }

    pub(crate) fn state_mut(&mut self) -> &mut TenantState {
        &mut self.working
    }

    /// Atomically publishes every write made through this transaction.
    pub fn commit(mut self) {
        *self.guard = self.working;
    }
}
