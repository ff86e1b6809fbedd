//! Coupons Repository

use jiff::Timestamp;

use crate::{
    domain::{
        carts::models::CustomerUuid,
        coupons::{
            errors::UsageError,
            models::{CouponRecord, CouponRedemptionRecord, CouponUuid},
        },
    },
    store::TenantTransaction,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemCouponsRepository;

impl MemCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Case-insensitive code lookup; codes are unique per tenant.
    pub(crate) fn find_by_code(&self, tx: &TenantTransaction, code: &str) -> Option<CouponRecord> {
        tx.state()
            .coupons
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned()
    }

    /// Inserts a coupon; false when the code is already taken.
    pub(crate) fn insert_coupon(&self, tx: &mut TenantTransaction, record: CouponRecord) -> bool {
        if self.find_by_code(tx, &record.code).is_some() {
            return false;
        }

        tx.state_mut().coupons.insert(record.uuid, record);

        true
    }

    /// Conditional increment of `used_count`. The limit is re-checked here
    /// rather than by the caller, and must run inside the same transaction
    /// as the order it belongs to.
    pub(crate) fn increment_usage(
        &self,
        tx: &mut TenantTransaction,
        coupon: CouponUuid,
        now: Timestamp,
    ) -> Result<(), UsageError> {
        let record = tx
            .state_mut()
            .coupons
            .get_mut(&coupon)
            .ok_or(UsageError::NotFound)?;

        if record
            .usage_limit
            .is_some_and(|limit| record.used_count >= limit)
        {
            return Err(UsageError::Exhausted);
        }

        record.used_count += 1;
        record.updated_at = now;

        Ok(())
    }

    /// How many times this customer has redeemed the coupon, counted from
    /// the redemption ledger rather than by scanning order snapshots.
    pub(crate) fn redemption_count(
        &self,
        tx: &TenantTransaction,
        coupon: CouponUuid,
        customer: CustomerUuid,
    ) -> u32 {
        let count = tx
            .state()
            .redemptions
            .iter()
            .filter(|r| r.coupon_uuid == coupon && r.customer_uuid == customer)
            .count();

        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub(crate) fn record_redemption(
        &self,
        tx: &mut TenantTransaction,
        redemption: CouponRedemptionRecord,
    ) {
        tx.state_mut().redemptions.push(redemption);
    }
}
