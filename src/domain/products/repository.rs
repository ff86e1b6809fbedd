//! Products Repository
//!
//! Catalog reads plus the inventory-reservation primitives. The stock
//! mutations are conditional updates; running them inside a
//! [`TenantTransaction`] is what makes them atomic with the rest of a
//! checkout.

use jiff::Timestamp;

use crate::{
    domain::products::{
        errors::StockError,
        models::{ProductRecord, ProductUuid, StockTarget, VariantRecord, VariantUuid},
    },
    store::TenantTransaction,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemProductsRepository;

impl MemProductsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn get_product(
        &self,
        tx: &TenantTransaction,
        product: ProductUuid,
    ) -> Option<ProductRecord> {
        tx.state().products.get(&product).cloned()
    }

    pub(crate) fn get_variant(
        &self,
        tx: &TenantTransaction,
        variant: VariantUuid,
    ) -> Option<VariantRecord> {
        tx.state().variants.get(&variant).cloned()
    }

    pub(crate) fn variants_of(
        &self,
        tx: &TenantTransaction,
        product: ProductUuid,
    ) -> Vec<VariantRecord> {
        tx.state()
            .variants
            .values()
            .filter(|v| v.product_uuid == product)
            .cloned()
            .collect()
    }

    /// Inserts a product; false when the uuid is taken.
    pub(crate) fn insert_product(
        &self,
        tx: &mut TenantTransaction,
        record: ProductRecord,
    ) -> bool {
        let products = &mut tx.state_mut().products;

        if products.contains_key(&record.uuid) {
            return false;
        }

        products.insert(record.uuid, record);

        true
    }

    pub(crate) fn insert_variant(
        &self,
        tx: &mut TenantTransaction,
        record: VariantRecord,
    ) -> bool {
        let variants = &mut tx.state_mut().variants;

        if variants.contains_key(&record.uuid) {
            return false;
        }

        variants.insert(record.uuid, record);

        true
    }

    pub(crate) fn update_product(&self, tx: &mut TenantTransaction, record: ProductRecord) {
        tx.state_mut().products.insert(record.uuid, record);
    }

    pub(crate) fn delete_product(&self, tx: &mut TenantTransaction, product: ProductUuid) -> bool {
        let removed = tx.state_mut().products.remove(&product).is_some();

        tx.state_mut()
            .variants
            .retain(|_, v| v.product_uuid != product);

        removed
    }

    /// Whether an order for `quantity` units of this product could be
    /// fulfilled right now. A product with variants is purchasable when any
    /// active variant alone can satisfy the quantity.
    pub(crate) fn can_purchase(
        &self,
        tx: &TenantTransaction,
        product: ProductUuid,
        quantity: u32,
    ) -> bool {
        let Some(record) = tx.state().products.get(&product) else {
            return false;
        };

        let variants = self.variants_of(tx, product);

        if variants.is_empty() {
            return record.can_supply(quantity);
        }

        record.is_active
            && record.is_published
            && variants
                .iter()
                .any(|v| v.can_supply(quantity, record.track_quantity))
    }

    /// Availability of one specific stock target, as a cart line references
    /// it.
    pub(crate) fn target_available(
        &self,
        tx: &TenantTransaction,
        target: StockTarget,
        quantity: u32,
    ) -> bool {
        match target {
            StockTarget::Product(product) => self.can_purchase(tx, product, quantity),
            StockTarget::Variant(variant) => {
                let Some(v) = tx.state().variants.get(&variant) else {
                    return false;
                };

                let Some(parent) = tx.state().products.get(&v.product_uuid) else {
                    return false;
                };

                parent.is_active
                    && parent.is_published
                    && v.can_supply(quantity, parent.track_quantity)
            }
        }
    }

    /// Decrements stock, refusing to drive a tracked quantity negative.
    /// A no-op for untracked products.
    pub(crate) fn decrease_stock(
        &self,
        tx: &mut TenantTransaction,
        target: StockTarget,
        quantity: u32,
        now: Timestamp,
    ) -> Result<(), StockError> {
        match target {
            StockTarget::Product(product) => {
                let tracked = {
                    let record = tx
                        .state()
                        .products
                        .get(&product)
                        .ok_or(StockError::NotFound)?;
                    record.track_quantity
                };

                if !tracked {
                    return Ok(());
                }

                let record = tx
                    .state_mut()
                    .products
                    .get_mut(&product)
                    .ok_or(StockError::NotFound)?;

                if record.quantity < quantity {
                    return Err(StockError::Insufficient {
                        available: record.quantity,
                        requested: quantity,
                    });
                }

                record.quantity -= quantity;
                record.updated_at = now;

                Ok(())
            }
            StockTarget::Variant(variant) => {
                let tracked = {
                    let v = tx
                        .state()
                        .variants
                        .get(&variant)
                        .ok_or(StockError::NotFound)?;
                    tx.state()
                        .products
                        .get(&v.product_uuid)
                        .ok_or(StockError::NotFound)?
                        .track_quantity
                };

                if !tracked {
                    return Ok(());
                }

                let record = tx
                    .state_mut()
                    .variants
                    .get_mut(&variant)
                    .ok_or(StockError::NotFound)?;

                if record.quantity < quantity {
                    return Err(StockError::Insufficient {
                        available: record.quantity,
                        requested: quantity,
                    });
                }

                record.quantity -= quantity;
                record.updated_at = now;

                Ok(())
            }
        }
    }

    /// Compensating increment for cancellations; symmetric with
    /// [`Self::decrease_stock`].
    pub(crate) fn increase_stock(
        &self,
        tx: &mut TenantTransaction,
        target: StockTarget,
        quantity: u32,
        now: Timestamp,
    ) -> Result<(), StockError> {
        match target {
            StockTarget::Product(product) => {
                let tracked = {
                    let record = tx
                        .state()
                        .products
                        .get(&product)
                        .ok_or(StockError::NotFound)?;
                    record.track_quantity
                };

                if !tracked {
                    return Ok(());
                }

                let record = tx
                    .state_mut()
                    .products
                    .get_mut(&product)
                    .ok_or(StockError::NotFound)?;

                record.quantity = record.quantity.saturating_add(quantity);
                record.updated_at = now;

                Ok(())
            }
            StockTarget::Variant(variant) => {
                let tracked = {
                    let v = tx
                        .state()
                        .variants
                        .get(&variant)
                        .ok_or(StockError::NotFound)?;
                    tx.state()
                        .products
                        .get(&v.product_uuid)
                        .ok_or(StockError::NotFound)?
                        .track_quantity
                };

                if !tracked {
                    return Ok(());
                }

                let record = tx
                    .state_mut()
                    .variants
                    .get_mut(&variant)
                    .ok_or(StockError::NotFound)?;

                record.quantity = record.quantity.saturating_add(quantity);
                record.updated_at = now;

                Ok(())
            }
        }
    }
}
