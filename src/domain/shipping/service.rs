//! Shipping service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        shipping::{
            errors::ShippingServiceError,
            models::{NewShippingRate, ShippingRateRecord},
            resolver,
        },
        tenants::models::TenantUuid,
    },
    store::Db,
};

#[derive(Debug, Clone)]
pub struct MemShippingService {
    db: Db,
}

impl MemShippingService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ShippingService for MemShippingService {
    async fn add_rate(
        &self,
        tenant: TenantUuid,
        rate: NewShippingRate,
    ) -> Result<ShippingRateRecord, ShippingServiceError> {
        if rate.amount < Decimal::ZERO {
            return Err(ShippingServiceError::NegativeAmount);
        }

        let now = Timestamp::now();

        let record = ShippingRateRecord {
            uuid: rate.uuid,
            country_code: rate.country_code,
            amount: rate.amount,
            free_above: rate.free_above,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        tx.state_mut().shipping_rates.push(record.clone());
        tx.commit();

        Ok(record)
    }

    async fn quote(
        &self,
        tenant: TenantUuid,
        country_code: &str,
        subtotal: Decimal,
    ) -> Result<Decimal, ShippingServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        Ok(resolver::resolve(
            &tx.state().shipping_rates,
            country_code,
            subtotal,
        ))
    }
}

#[automock]
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Adds a shipping rate to the tenant's table.
    async fn add_rate(
        &self,
        tenant: TenantUuid,
        rate: NewShippingRate,
    ) -> Result<ShippingRateRecord, ShippingServiceError>;

    /// Resolves the shipping amount for a destination and subtotal.
    async fn quote(
        &self,
        tenant: TenantUuid,
        country_code: &str,
        subtotal: Decimal,
    ) -> Result<Decimal, ShippingServiceError>;
}
