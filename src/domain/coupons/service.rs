//! Coupons service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        coupons::{
            errors::CouponsServiceError,
            models::{CouponKind, CouponRecord, NewCoupon},
            repository::MemCouponsRepository,
        },
        tenants::models::TenantUuid,
    },
    store::Db,
};

#[derive(Debug, Clone)]
pub struct MemCouponsService {
    db: Db,
    repository: MemCouponsRepository,
}

impl MemCouponsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: MemCouponsRepository::new(),
        }
    }
}

#[async_trait]
impl CouponsService for MemCouponsService {
    async fn create_coupon(
        &self,
        tenant: TenantUuid,
        coupon: NewCoupon,
    ) -> Result<CouponRecord, CouponsServiceError> {
        if coupon.value <= Decimal::ZERO {
            return Err(CouponsServiceError::InvalidValue);
        }

        if coupon.kind == CouponKind::Percentage && coupon.value > Decimal::ONE_HUNDRED {
            return Err(CouponsServiceError::PercentageOutOfRange);
        }

        let now = Timestamp::now();

        let record = CouponRecord {
            uuid: coupon.uuid,
            code: coupon.code,
            name: coupon.name,
            kind: coupon.kind,
            value: coupon.value,
            minimum_amount: coupon.minimum_amount,
            usage_limit: coupon.usage_limit,
            usage_limit_per_user: coupon.usage_limit_per_user,
            used_count: 0,
            starts_at: coupon.starts_at,
            expires_at: coupon.expires_at,
            is_active: true,
            applicable_products: coupon.applicable_products,
            applicable_categories: coupon.applicable_categories,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if !self.repository.insert_coupon(&mut tx, record.clone()) {
            return Err(CouponsServiceError::AlreadyExists);
        }

        tx.commit();

        Ok(record)
    }

    async fn get_coupon_by_code(
        &self,
        tenant: TenantUuid,
        code: &str,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        self.repository
            .find_by_code(&tx, code)
            .ok_or(CouponsServiceError::NotFound)
    }

    async fn set_active(
        &self,
        tenant: TenantUuid,
        code: &str,
        is_active: bool,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .repository
            .find_by_code(&tx, code)
            .ok_or(CouponsServiceError::NotFound)?;

        record.is_active = is_active;
        record.updated_at = Timestamp::now();

        tx.state_mut().coupons.insert(record.uuid, record.clone());
        tx.commit();

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    /// Creates a coupon with a tenant-unique code.
    async fn create_coupon(
        &self,
        tenant: TenantUuid,
        coupon: NewCoupon,
    ) -> Result<CouponRecord, CouponsServiceError>;

    /// Looks a coupon up by its code, case-insensitively.
    async fn get_coupon_by_code(
        &self,
        tenant: TenantUuid,
        code: &str,
    ) -> Result<CouponRecord, CouponsServiceError>;

    /// Activates or deactivates a coupon.
    async fn set_active(
        &self,
        tenant: TenantUuid,
        code: &str,
        is_active: bool,
    ) -> Result<CouponRecord, CouponsServiceError>;
}
