//! Tenants service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::tenants::{
        errors::TenantsServiceError,
        models::{ExchangeRate, NewTenant, TenantRecord, TenantUuid},
    },
    store::Db,
};

#[derive(Debug, Clone)]
pub struct MemTenantsService {
    db: Db,
}

impl MemTenantsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TenantsService for MemTenantsService {
    async fn create_tenant(&self, tenant: NewTenant) -> Result<TenantRecord, TenantsServiceError> {
        let now = Timestamp::now();

        let record = TenantRecord {
            uuid: tenant.uuid,
            name: tenant.name,
            default_currency: tenant.default_currency,
            created_at: now,
            updated_at: now,
        };

        self.db.register_tenant(record.clone())?;

        Ok(record)
    }

    async fn get_tenant(&self, tenant: TenantUuid) -> Result<TenantRecord, TenantsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        Ok(tx.state().tenant.clone())
    }

    async fn set_exchange_rate(
        &self,
        tenant: TenantUuid,
        rate: ExchangeRate,
    ) -> Result<(), TenantsServiceError> {
        if rate.rate <= Decimal::ZERO {
            return Err(TenantsServiceError::InvalidExchangeRate);
        }

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        tx.state_mut()
            .exchange_rates
            .insert(rate.currency, rate.rate);

        tx.commit();

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait TenantsService: Send + Sync {
    /// Registers a new tenant and creates its state partition.
    async fn create_tenant(&self, tenant: NewTenant) -> Result<TenantRecord, TenantsServiceError>;

    /// Retrieves a tenant's registration record.
    async fn get_tenant(&self, tenant: TenantUuid) -> Result<TenantRecord, TenantsServiceError>;

    /// Sets the rate used to convert the given currency into the tenant's
    /// reporting currency on future accounting entries.
    async fn set_exchange_rate(
        &self,
        tenant: TenantUuid,
        rate: ExchangeRate,
    ) -> Result<(), TenantsServiceError>;
}
