//! Payments Repository

use crate::{
    domain::{
        orders::models::OrderUuid,
        payments::models::{PaymentRecord, PaymentUuid},
    },
    store::TenantTransaction,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemPaymentsRepository;

impl MemPaymentsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn get_payment(
        &self,
        tx: &TenantTransaction,
        payment: PaymentUuid,
    ) -> Option<PaymentRecord> {
        tx.state().payments.get(&payment).cloned()
    }

    /// The most recently created payment row for an order.
    pub(crate) fn latest_for_order(
        &self,
        tx: &TenantTransaction,
        order: OrderUuid,
    ) -> Option<PaymentRecord> {
        tx.state()
            .payments
            .values()
            .filter(|p| p.order_uuid == order)
            .max_by_key(|p| p.created_at)
            .cloned()
    }

    pub(crate) fn insert_payment(&self, tx: &mut TenantTransaction, record: PaymentRecord) {
        tx.state_mut().payments.insert(record.uuid, record);
    }

    pub(crate) fn update_payment(&self, tx: &mut TenantTransaction, record: PaymentRecord) {
        tx.state_mut().payments.insert(record.uuid, record);
    }
}
