//! Carts service.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        carts::{
            errors::{CartsServiceError, CouponRejection},
            models::{
                CartItemRecord, CartItemUuid, CartRecord, CartUuid, Destination, NewCart,
                NewCartItem,
            },
            repository::MemCartsRepository,
            totals,
        },
        coupons::{evaluator, models::CouponSnapshot, repository::MemCouponsRepository},
        products::{models::ProductSnapshot, repository::MemProductsRepository},
        taxes::cache::TaxCache,
        tenants::models::TenantUuid,
    },
    store::Db,
};

#[derive(Clone)]
pub struct MemCartsService {
    db: Db,
    tax_cache: Arc<dyn TaxCache>,
    carts: MemCartsRepository,
    products: MemProductsRepository,
    coupons: MemCouponsRepository,
}

impl MemCartsService {
    #[must_use]
    pub fn new(db: Db, tax_cache: Arc<dyn TaxCache>) -> Self {
        Self {
            db,
            tax_cache,
            carts: MemCartsRepository::new(),
            products: MemProductsRepository::new(),
            coupons: MemCouponsRepository::new(),
        }
    }
}

#[async_trait]
impl CartsService for MemCartsService {
    async fn create_cart(
        &self,
        tenant: TenantUuid,
        cart: NewCart,
    ) -> Result<CartRecord, CartsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let currency = cart
            .currency
            .unwrap_or_else(|| tx.state().tenant.default_currency.clone());

        let record = CartRecord {
            uuid: cart.uuid,
            owner: cart.owner,
            currency,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            coupon: None,
            destination: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        if !self.carts.insert_cart(&mut tx, record.clone()) {
            return Err(CartsServiceError::AlreadyExists);
        }

        tx.commit();

        Ok(record)
    }

    async fn get_cart(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
    ) -> Result<CartRecord, CartsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        self.carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)
    }

    async fn add_item(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        item: NewCartItem,
    ) -> Result<CartRecord, CartsServiceError> {
        if item.quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)?;

        let product = self
            .products
            .get_product(&tx, item.product_uuid)
            .ok_or(CartsServiceError::ProductNotFound)?;

        let variant = match item.variant_uuid {
            Some(uuid) => {
                let variant = self
                    .products
                    .get_variant(&tx, uuid)
                    .filter(|v| v.product_uuid == product.uuid)
                    .ok_or(CartsServiceError::VariantNotFound)?;

                Some(variant)
            }
            None => None,
        };

        if product.currency != record.currency {
            return Err(CartsServiceError::CurrencyMismatch);
        }

        match record.find_item(item.product_uuid, item.variant_uuid) {
            Some(index) => {
                // Merge into the existing line at its original unit price.
                let line = &mut record.items[index];
                line.quantity += item.quantity;
                line.total_price = line.unit_price * Decimal::from(line.quantity);
                line.updated_at = now;
            }
            None => {
                let unit_price = variant
                    .as_ref()
                    .and_then(|v| v.price)
                    .unwrap_or(product.price);

                record.items.push(CartItemRecord {
                    uuid: item.uuid,
                    product_uuid: item.product_uuid,
                    variant_uuid: item.variant_uuid,
                    quantity: item.quantity,
                    unit_price,
                    total_price: unit_price * Decimal::from(item.quantity),
                    product: ProductSnapshot::capture(&product, variant.as_ref()),
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut record, now);
        self.carts.update_cart(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }

    async fn update_item_quantity(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        item: CartItemUuid,
        quantity: u32,
    ) -> Result<CartRecord, CartsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)?;

        let index = record
            .items
            .iter()
            .position(|line| line.uuid == item)
            .ok_or(CartsServiceError::ItemNotFound)?;

        if quantity == 0 {
            record.items.remove(index);
        } else {
            let line = &mut record.items[index];
            line.quantity = quantity;
            line.total_price = line.unit_price * Decimal::from(quantity);
            line.updated_at = now;
        }

        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut record, now);
        self.carts.update_cart(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }

    async fn remove_item(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        item: CartItemUuid,
    ) -> Result<CartRecord, CartsServiceError> {
        self.update_item_quantity(tenant, cart, item, 0).await
    }

    async fn clear_cart(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
    ) -> Result<CartRecord, CartsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)?;

        record.items.clear();
        record.coupon = None;

        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut record, now);
        self.carts.update_cart(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }

    async fn apply_coupon(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        code: &str,
    ) -> Result<CartRecord, CartsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)?;

        let coupon = self
            .coupons
            .find_by_code(&tx, code)
            .ok_or(CartsServiceError::CouponRejected(CouponRejection::NotFound))?;

        if !evaluator::is_valid(&coupon, now) {
            return Err(CartsServiceError::CouponRejected(
                CouponRejection::NotRedeemable,
            ));
        }

        if coupon
            .minimum_amount
            .is_some_and(|minimum| record.subtotal < minimum)
        {
            return Err(CartsServiceError::CouponRejected(
                CouponRejection::BelowMinimum,
            ));
        }

        if !totals::coupon_covers_cart(&tx, &record, &coupon) {
            return Err(CartsServiceError::CouponRejected(
                CouponRejection::NotApplicable,
            ));
        }

        record.coupon = Some(CouponSnapshot::capture(&coupon));

        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut record, now);
        self.carts.update_cart(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }

    async fn remove_coupon(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
    ) -> Result<CartRecord, CartsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)?;

        record.coupon = None;

        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut record, now);
        self.carts.update_cart(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }

    async fn set_destination(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        destination: Option<Destination>,
    ) -> Result<CartRecord, CartsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .carts
            .get_cart(&tx, cart)
            .ok_or(CartsServiceError::NotFound)?;

        record.destination = destination;

        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut record, now);
        self.carts.update_cart(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Creates an empty cart for an owner.
    async fn create_cart(
        &self,
        tenant: TenantUuid,
        cart: NewCart,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Fetches a cart with its items and totals.
    async fn get_cart(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Adds a product (or variant) line, merging into an existing line for
    /// the same product and variant.
    async fn add_item(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        item: NewCartItem,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Sets a line's quantity; zero removes the line.
    async fn update_item_quantity(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        item: CartItemUuid,
        quantity: u32,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Removes a line.
    async fn remove_item(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        item: CartItemUuid,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Empties the cart and drops any applied coupon.
    async fn clear_cart(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Applies a coupon by code, snapshotting its terms onto the cart.
    async fn apply_coupon(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        code: &str,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Drops the applied coupon.
    async fn remove_coupon(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Sets (or clears) the shipping destination used for tax and shipping
    /// estimates.
    async fn set_destination(
        &self,
        tenant: TenantUuid,
        cart: CartUuid,
        destination: Option<Destination>,
    ) -> Result<CartRecord, CartsServiceError>;
}
