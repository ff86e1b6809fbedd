//! Taxes service.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        taxes::{
            cache::{TaxCache, TaxCacheKey},
            calculator,
            errors::TaxesServiceError,
            models::{NewTaxRule, TaxAssessment, TaxQuery, TaxRuleRecord, TaxTreatment},
        },
        tenants::models::TenantUuid,
    },
    store::Db,
};

#[derive(Clone)]
pub struct MemTaxesService {
    db: Db,
    cache: Arc<dyn TaxCache>,
}

impl MemTaxesService {
    #[must_use]
    pub fn new(db: Db, cache: Arc<dyn TaxCache>) -> Self {
        Self { db, cache }
    }
}

#[async_trait]
impl TaxesService for MemTaxesService {
    async fn add_rule(
        &self,
        tenant: TenantUuid,
        rule: NewTaxRule,
    ) -> Result<TaxRuleRecord, TaxesServiceError> {
        if rule.rate < Decimal::ZERO {
            return Err(TaxesServiceError::NegativeRate);
        }

        let now = Timestamp::now();

        let record = TaxRuleRecord {
            uuid: rule.uuid,
            name: rule.name,
            country_code: rule.country_code,
            state: rule.state,
            postal_code: rule.postal_code,
            city: rule.city,
            rate: rule.rate,
            is_compound: rule.is_compound,
            min_amount: rule.min_amount,
            max_amount: rule.max_amount,
            applicable_categories: rule.applicable_categories,
            customer_groups: rule.customer_groups,
            starts_at: rule.starts_at,
            expires_at: rule.expires_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        tx.state_mut().tax_rules.push(record.clone());
        tx.commit();

        Ok(record)
    }

    async fn set_inclusive_pricing(
        &self,
        tenant: TenantUuid,
        country_code: &str,
        inclusive: bool,
    ) -> Result<(), TaxesServiceError> {
        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let countries = &mut tx.state_mut().tax_inclusive_countries;

        if inclusive {
            countries.insert(country_code.to_ascii_uppercase());
        } else {
            countries.remove(&country_code.to_ascii_uppercase());
        }

        tx.commit();

        Ok(())
    }

    async fn quote(
        &self,
        tenant: TenantUuid,
        query: TaxQuery,
    ) -> Result<TaxAssessment, TaxesServiceError> {
        let now = Timestamp::now();

        let tx = self.db.begin_tenant_transaction(tenant).await?;

        let treatment = if tx
            .state()
            .tax_inclusive_countries
            .contains(&query.country_code.to_ascii_uppercase())
        {
            TaxTreatment::Inclusive
        } else {
            TaxTreatment::Exclusive
        };

        let key = TaxCacheKey {
            query: query.clone(),
            treatment,
        };

        if let Some(cached) = self.cache.get(&key, now) {
            return Ok(cached);
        }

        let assessment = calculator::assess(&tx.state().tax_rules, &query, treatment, now);

        self.cache.put(key, assessment.clone(), now);

        Ok(assessment)
    }
}

#[automock]
#[async_trait]
pub trait TaxesService: Send + Sync {
    /// Adds a tax rule.
    async fn add_rule(
        &self,
        tenant: TenantUuid,
        rule: NewTaxRule,
    ) -> Result<TaxRuleRecord, TaxesServiceError>;

    /// Marks a country's prices as tax-inclusive (or not).
    async fn set_inclusive_pricing(
        &self,
        tenant: TenantUuid,
        country_code: &str,
        inclusive: bool,
    ) -> Result<(), TaxesServiceError>;

    /// Resolves a tax quote, consulting the cache first.
    async fn quote(
        &self,
        tenant: TenantUuid,
        query: TaxQuery,
    ) -> Result<TaxAssessment, TaxesServiceError>;
}
