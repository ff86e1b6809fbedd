//! Orders Repository

use crate::{
    domain::orders::models::{OrderRecord, OrderUuid},
    store::TenantTransaction,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemOrdersRepository;

impl MemOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn get_order(
        &self,
        tx: &TenantTransaction,
        order: OrderUuid,
    ) -> Option<OrderRecord> {
        tx.state().orders.get(&order).cloned()
    }

    pub(crate) fn number_taken(&self, tx: &TenantTransaction, number: &str) -> bool {
        tx.state().orders.values().any(|o| o.number == number)
    }

    pub(crate) fn insert_order(&self, tx: &mut TenantTransaction, record: OrderRecord) {
        tx.state_mut().orders.insert(record.uuid, record);
    }

    pub(crate) fn update_order(&self, tx: &mut TenantTransaction, record: OrderRecord) {
        tx.state_mut().orders.insert(record.uuid, record);
    }
}
