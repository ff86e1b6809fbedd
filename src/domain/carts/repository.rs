//! Carts Repository

use crate::{
    domain::carts::models::{CartRecord, CartUuid},
    store::TenantTransaction,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemCartsRepository;

impl MemCartsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn get_cart(&self, tx: &TenantTransaction, cart: CartUuid) -> Option<CartRecord> {
        tx.state().carts.get(&cart).cloned()
    }

    /// Inserts a cart; false when the uuid is taken.
    pub(crate) fn insert_cart(&self, tx: &mut TenantTransaction, record: CartRecord) -> bool {
        let carts = &mut tx.state_mut().carts;

        if carts.contains_key(&record.uuid) {
            return false;
        }

        carts.insert(record.uuid, record);

        true
    }

    pub(crate) fn update_cart(&self, tx: &mut TenantTransaction, record: CartRecord) {
        tx.state_mut().carts.insert(record.uuid, record);
    }
}
