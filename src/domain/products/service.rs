//! Products service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        products::{
            errors::ProductsServiceError,
            models::{
                NewProduct, NewVariant, ProductRecord, ProductUuid, StockTarget, VariantRecord,
            },
            repository::MemProductsRepository,
        },
        tenants::models::TenantUuid,
    },
    store::Db,
};

#[derive(Debug, Clone)]
pub struct MemProductsService {
    db: Db,
    repository: MemProductsRepository,
}

impl MemProductsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: MemProductsRepository::new(),
        }
    }
}

#[async_trait]
impl ProductsService for MemProductsService {
    async fn create_product(
        &self,
        tenant: TenantUuid,
        product: NewProduct,
    ) -> Result<ProductRecord, ProductsServiceError> {
        if product.price < Decimal::ZERO {
            return Err(ProductsServiceError::NegativePrice);
        }

        let now = Timestamp::now();

        let record = ProductRecord {
            uuid: product.uuid,
            name: product.name,
            sku: product.sku,
            slug: product.slug,
            image: product.image,
            price: product.price,
            currency: product.currency,
            is_active: product.is_active,
            is_published: product.is_published,
            track_quantity: product.track_quantity,
            quantity: product.quantity,
            categories: product.categories,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if !self.repository.insert_product(&mut tx, record.clone()) {
            return Err(ProductsServiceError::AlreadyExists);
        }

        tx.commit();

        Ok(record)
    }

    async fn create_variant(
        &self,
        tenant: TenantUuid,
        variant: NewVariant,
    ) -> Result<VariantRecord, ProductsServiceError> {
        if variant.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(ProductsServiceError::NegativePrice);
        }

        let now = Timestamp::now();

        let record = VariantRecord {
            uuid: variant.uuid,
            product_uuid: variant.product_uuid,
            sku: variant.sku,
            price: variant.price,
            attributes: variant.attributes,
            is_active: variant.is_active,
            quantity: variant.quantity,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if self
            .repository
            .get_product(&tx, record.product_uuid)
            .is_none()
        {
            return Err(ProductsServiceError::NotFound);
        }

        if !self.repository.insert_variant(&mut tx, record.clone()) {
            return Err(ProductsServiceError::AlreadyExists);
        }

        tx.commit();

        Ok(record)
    }

    async fn get_product(
        &self,
        tenant: TenantUuid,
        product: ProductUuid,
    ) -> Result<ProductRecord, ProductsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        self.repository
            .get_product(&tx, product)
            .ok_or(ProductsServiceError::NotFound)
    }

    async fn set_stock(
        &self,
        tenant: TenantUuid,
        target: StockTarget,
        quantity: u32,
    ) -> Result<(), ProductsServiceError> {
        let now = Timestamp::now();
        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        match target {
            StockTarget::Product(product) => {
                let mut record = self
                    .repository
                    .get_product(&tx, product)
                    .ok_or(ProductsServiceError::NotFound)?;

                record.quantity = quantity;
                record.updated_at = now;
                self.repository.update_product(&mut tx, record);
            }
            StockTarget::Variant(variant) => {
                let mut record = self
                    .repository
                    .get_variant(&tx, variant)
                    .ok_or(ProductsServiceError::NotFound)?;

                record.quantity = quantity;
                record.updated_at = now;
                tx.state_mut().variants.insert(record.uuid, record);
            }
        }

        tx.commit();

        Ok(())
    }

    async fn delete_product(
        &self,
        tenant: TenantUuid,
        product: ProductUuid,
    ) -> Result<(), ProductsServiceError> {
        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if !self.repository.delete_product(&mut tx, product) {
            return Err(ProductsServiceError::NotFound);
        }

        tx.commit();

        Ok(())
    }

    async fn can_be_purchased(
        &self,
        tenant: TenantUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<bool, ProductsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        Ok(self.repository.can_purchase(&tx, product, quantity))
    }
}

#[automock]
#[async_trait]
pub trait ProductsService: Send + Sync {
    /// Creates a product.
    async fn create_product(
        &self,
        tenant: TenantUuid,
        product: NewProduct,
    ) -> Result<ProductRecord, ProductsServiceError>;

    /// Creates a variant under an existing product.
    async fn create_variant(
        &self,
        tenant: TenantUuid,
        variant: NewVariant,
    ) -> Result<VariantRecord, ProductsServiceError>;

    /// Retrieves a single product.
    async fn get_product(
        &self,
        tenant: TenantUuid,
        product: ProductUuid,
    ) -> Result<ProductRecord, ProductsServiceError>;

    /// Overwrites the on-hand quantity of a product or variant.
    async fn set_stock(
        &self,
        tenant: TenantUuid,
        target: StockTarget,
        quantity: u32,
    ) -> Result<(), ProductsServiceError>;

    /// Removes a product and its variants.
    async fn delete_product(
        &self,
        tenant: TenantUuid,
        product: ProductUuid,
    ) -> Result<(), ProductsServiceError>;

    /// Live availability check for the given quantity.
    async fn can_be_purchased(
        &self,
        tenant: TenantUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<bool, ProductsServiceError>;
}
