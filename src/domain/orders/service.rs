//! Orders service.
//!
//! Checkout is the one place carts, coupons, stock, payments and orders
//! meet. Everything from the availability re-check to the cart clear runs
//! inside a single tenant transaction, so a failure at any step leaves no
//! partial writes. Ledger posting happens after commit; its failure is
//! logged, never unwound into the order.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        accounting::service::AccountingService,
        carts::{repository::MemCartsRepository, totals},
        coupons::{
            models::{CouponRedemptionRecord, CouponUuid},
            repository::MemCouponsRepository,
        },
        orders::{
            errors::OrdersServiceError,
            models::{
                CheckoutRequest, OrderItemRecord, OrderItemUuid, OrderPaymentStatus, OrderRecord,
                OrderStatus, OrderUuid,
            },
            numbers,
            repository::MemOrdersRepository,
        },
        payments::{
            models::{PaymentRecord, PaymentStatus, PaymentUuid},
            repository::MemPaymentsRepository,
        },
        products::{errors::StockError, repository::MemProductsRepository},
        taxes::cache::TaxCache,
        tenants::models::TenantUuid,
    },
    store::{Db, TenantTransaction},
};

#[derive(Clone)]
pub struct MemOrdersService {
    db: Db,
    accounting: Arc<dyn AccountingService>,
    tax_cache: Arc<dyn TaxCache>,
    carts: MemCartsRepository,
    coupons: MemCouponsRepository,
    orders: MemOrdersRepository,
    payments: MemPaymentsRepository,
    products: MemProductsRepository,
}

impl MemOrdersService {
    #[must_use]
    pub fn new(
        db: Db,
        accounting: Arc<dyn AccountingService>,
        tax_cache: Arc<dyn TaxCache>,
    ) -> Self {
        Self {
            db,
            accounting,
            tax_cache,
            carts: MemCartsRepository::new(),
            coupons: MemCouponsRepository::new(),
            orders: MemOrdersRepository::new(),
            payments: MemPaymentsRepository::new(),
            products: MemProductsRepository::new(),
        }
    }

    /// Re-validates the applied coupon and claims one use under the open
    /// transaction. Returns the coupon to record a redemption for, if any.
    fn claim_coupon_use(
        &self,
        tx: &mut TenantTransaction,
        cart: &crate::domain::carts::models::CartRecord,
        now: Timestamp,
    ) -> Result<Option<CouponUuid>, OrdersServiceError> {
        if cart.discount_amount <= Decimal::ZERO {
            return Ok(None);
        }

        let Some(snapshot) = &cart.coupon else {
            return Ok(None);
        };

        let live = self
            .coupons
            .find_by_code(tx, &snapshot.code)
            .ok_or(OrdersServiceError::CouponExhausted)?;

        if let Some(customer) = cart.owner.customer() {
            if let Some(limit) = live.usage_limit_per_user {
                if self.coupons.redemption_count(tx, live.uuid, customer) >= limit {
                    return Err(OrdersServiceError::CouponPerUserLimitReached);
                }
            }
        }

        self.coupons
            .increment_usage(tx, live.uuid, now)
            .map_err(|_| OrdersServiceError::CouponExhausted)?;

        Ok(Some(live.uuid))
    }
}

#[async_trait]
impl OrdersService for MemOrdersService {
    #[tracing::instrument(skip(self, request), fields(%tenant, cart = %request.cart_uuid))]
    async fn checkout(
        &self,
        tenant: TenantUuid,
        request: CheckoutRequest,
    ) -> Result<OrderRecord, OrdersServiceError> {
        // Address validation happens before any transaction starts.
        let shipping_address = request.shipping_address;
        let missing = shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(OrdersServiceError::InvalidAddress { fields: missing });
        }

        let billing_address = request
            .billing_address
            .unwrap_or_else(|| shipping_address.clone());
        let missing = billing_address.missing_fields();
        if !missing.is_empty() {
            return Err(OrdersServiceError::InvalidAddress { fields: missing });
        }

        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut cart = self
            .carts
            .get_cart(&tx, request.cart_uuid)
            .ok_or(OrdersServiceError::CartNotFound)?;

        if cart.is_empty() {
            return Err(OrdersServiceError::EmptyCart);
        }

        // Totals are settled against the checkout destination, under the
        // transaction, before anything is written.
        cart.destination = Some(shipping_address.destination());
        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut cart, now);

        // Availability re-check inside the transaction closes the race
        // between cart display and checkout. First failure wins.
        for item in &cart.items {
            if !self
                .products
                .target_available(&tx, item.stock_target(), item.quantity)
            {
                return Err(OrdersServiceError::ItemUnavailable {
                    sku: item.product.sku.clone(),
                });
            }
        }

        let redeemed = self.claim_coupon_use(&mut tx, &cart, now)?;

        let mut number = numbers::order_number(now);
        while self.orders.number_taken(&tx, &number) {
            number = numbers::order_number(now);
        }

        let order_uuid = OrderUuid::random();

        let items: Vec<OrderItemRecord> = cart
            .items
            .iter()
            .map(|item| OrderItemRecord {
                uuid: OrderItemUuid::random(),
                product_uuid: item.product_uuid,
                variant_uuid: item.variant_uuid,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
                product: item.product.clone(),
            })
            .collect();

        for item in &cart.items {
            self.products
                .decrease_stock(&mut tx, item.stock_target(), item.quantity, now)
                .map_err(|_: StockError| OrdersServiceError::ItemUnavailable {
                    sku: item.product.sku.clone(),
                })?;
        }

        if let Some(coupon_uuid) = redeemed {
            if let Some(customer) = cart.owner.customer() {
                self.coupons.record_redemption(
                    &mut tx,
                    CouponRedemptionRecord {
                        coupon_uuid,
                        customer_uuid: customer,
                        order_uuid,
                        redeemed_at: now,
                    },
                );
            }
        }

        let order = OrderRecord {
            uuid: order_uuid,
            number,
            placed_by: cart.owner,
            currency: cart.currency.clone(),
            subtotal: cart.subtotal,
            tax_amount: cart.tax_amount,
            shipping_amount: cart.shipping_amount,
            discount_amount: cart.discount_amount,
            total: cart.total,
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            coupon: cart.coupon.clone(),
            shipping_address,
            billing_address,
            notes: request.notes,
            items,
            placed_at: now,
            updated_at: now,
        };

        self.payments.insert_payment(
            &mut tx,
            PaymentRecord {
                uuid: PaymentUuid::random(),
                order_uuid,
                status: PaymentStatus::Pending,
                amount: order.total,
                currency: order.currency.clone(),
                method: request.payment_method,
                transaction_id: None,
                gateway_response: None,
                refund_amount: None,
                refund_reason: None,
                refund_id: None,
                paid_at: None,
                failed_at: None,
                refunded_at: None,
                created_at: now,
                updated_at: now,
            },
        );

        self.orders.insert_order(&mut tx, order.clone());

        // The cart is consumed only on success; an aborted checkout leaves
        // it intact for a safe retry.
        cart.items.clear();
        cart.coupon = None;
        totals::recalculate(&tx, self.tax_cache.as_ref(), &mut cart, now);
        self.carts.update_cart(&mut tx, cart);

        tx.commit();

        tracing::info!(order = %order.number, total = %order.total, "order created");

        if let Err(error) = self.accounting.post_order_created(tenant, &order).await {
            tracing::error!(
                order = %order.number,
                %error,
                "order-creation ledger posting failed; entries need manual reconciliation"
            );
        }

        Ok(order)
    }

    async fn get_order(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        self.orders
            .get_order(&tx, order)
            .ok_or(OrdersServiceError::NotFound)
    }

    async fn update_status(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
        next: OrderStatus,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .orders
            .get_order(&tx, order)
            .ok_or(OrdersServiceError::NotFound)?;

        if !record.status.can_transition_to(next) {
            return Err(OrdersServiceError::InvalidTransition {
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        record.updated_at = now;

        self.orders.update_order(&mut tx, record.clone());
        tx.commit();

        Ok(record)
    }

    async fn cancel_order(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut record = self
            .orders
            .get_order(&tx, order)
            .ok_or(OrdersServiceError::NotFound)?;

        if !record.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrdersServiceError::InvalidTransition {
                from: record.status,
                to: OrderStatus::Cancelled,
            });
        }

        // Symmetric restore for every decrement made at checkout, per item,
        // to the exact stock row it came from.
        for item in &record.items {
            if let Err(StockError::NotFound | StockError::Insufficient { .. }) = self
                .products
                .increase_stock(&mut tx, item.stock_target(), item.quantity, now)
            {
                tracing::warn!(
                    order = %record.number,
                    sku = %item.product.sku,
                    "stock row gone; skipping restore for this item"
                );
            }
        }

        if let Some(mut payment) = self.payments.latest_for_order(&tx, record.uuid) {
            if payment.status == PaymentStatus::Pending {
                payment.status = PaymentStatus::Cancelled;
                payment.updated_at = now;
                self.payments.update_payment(&mut tx, payment);
            }
        }

        record.status = OrderStatus::Cancelled;
        record.updated_at = now;

        self.orders.update_order(&mut tx, record.clone());
        tx.commit();

        tracing::info!(order = %record.number, "order cancelled");

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Converts a cart into an order, a pending payment and stock
    /// decrements, atomically.
    async fn checkout(
        &self,
        tenant: TenantUuid,
        request: CheckoutRequest,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Fetches an order with its items.
    async fn get_order(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Moves an order along its status machine.
    async fn update_status(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
        next: OrderStatus,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Cancels an order, restoring stock per item and cancelling any
    /// still-pending payment.
    async fn cancel_order(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        domain::accounting::models::{EntryCategory, SourceRef},
        test::{TestContext, helpers},
    };

    use super::*;

    #[tokio::test]
    async fn checkout_converts_the_cart_into_an_order() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 10).await;
        helpers::add_tax_rule(&ctx, "GB", Decimal::from(20), false).await;
        helpers::add_shipping_rate(&ctx, "GB", Decimal::from(5), None).await;

        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 2))
            .await
            .expect("add_item should succeed");

        let order = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await
            .expect("checkout should succeed");

        assert_eq!(order.subtotal, Decimal::new(50_00, 2));
        assert_eq!(order.tax_amount, Decimal::new(10_00, 2));
        assert_eq!(order.shipping_amount, Decimal::from(5));
        assert_eq!(order.total, Decimal::new(65_00, 2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product.sku, lamp.sku);

        // Stock was decremented, the cart was consumed, and a pending
        // payment exists for the total.
        let product = ctx
            .app
            .products
            .get_product(ctx.tenant, lamp.uuid)
            .await
            .expect("get_product should succeed");
        assert_eq!(product.quantity, 8);

        let cart = ctx
            .app
            .carts
            .get_cart(ctx.tenant, cart.uuid)
            .await
            .expect("get_cart should succeed");
        assert!(cart.is_empty());
        assert_eq!(cart.total, Decimal::ZERO);

        let payment = ctx
            .app
            .payments
            .payment_for_order(ctx.tenant, order.uuid)
            .await
            .expect("payment_for_order should succeed");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, order.total);

        let entries = ctx
            .app
            .accounting
            .entries_for(ctx.tenant, SourceRef::Order(order.uuid))
            .await
            .expect("entries_for should succeed");
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().any(|e| e.category == EntryCategory::Sales));
    }

    #[tokio::test]
    async fn checkout_fails_when_stock_ran_out() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 2).await;

        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 2))
            .await
            .expect("add_item should succeed");

        // The stock drains between cart display and checkout.
        helpers::set_stock(&ctx, lamp.uuid, 0).await;

        let result = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::ItemUnavailable { .. })),
            "expected ItemUnavailable, got {result:?}"
        );

        // No partial writes: the cart is intact and ready for retry.
        let cart = ctx
            .app
            .carts
            .get_cart(ctx.tenant, cart.uuid)
            .await
            .expect("get_cart should succeed");
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn empty_cart_cannot_check_out() {
        let ctx = TestContext::new().await;
        let cart = helpers::create_cart(&ctx).await;

        let result = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::EmptyCart)),
            "expected EmptyCart, got {result:?}"
        );
    }

    #[tokio::test]
    async fn missing_address_fields_fail_before_any_write() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 10).await;
        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 1))
            .await
            .expect("add_item should succeed");

        let mut request = helpers::checkout_request(cart.uuid);
        request.shipping_address.city = String::new();

        let result = ctx.app.orders.checkout(ctx.tenant, request).await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::InvalidAddress { ref fields }) if fields == &vec!["city"]
            ),
            "expected InvalidAddress for city, got {result:?}"
        );
    }

    #[tokio::test]
    async fn billing_address_defaults_to_shipping() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 10).await;
        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 1))
            .await
            .expect("add_item should succeed");

        let order = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await
            .expect("checkout should succeed");

        assert_eq!(order.billing_address, order.shipping_address);
    }

    #[tokio::test]
    async fn order_items_outlive_product_deletion() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 10).await;
        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 1))
            .await
            .expect("add_item should succeed");

        let order = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await
            .expect("checkout should succeed");

        ctx.app
            .products
            .delete_product(ctx.tenant, lamp.uuid)
            .await
            .expect("delete_product should succeed");

        let order = ctx
            .app
            .orders
            .get_order(ctx.tenant, order.uuid)
            .await
            .expect("get_order should succeed");

        assert_eq!(order.items[0].product.name, lamp.name);
        assert_eq!(order.items[0].product.sku, lamp.sku);
        assert_eq!(order.items[0].product.slug, lamp.slug);
    }

    #[tokio::test]
    async fn concurrent_checkouts_never_oversell_a_coupon() {
        let ctx = Arc::new(TestContext::new().await);

        let lamp = helpers::create_product(&ctx, Decimal::from(100), 1_000).await;

        let mut coupon = helpers::new_fixed_coupon("LAST-ONE", Decimal::from(10), None);
        coupon.usage_limit = Some(1);
        ctx.app
            .coupons
            .create_coupon(ctx.tenant, coupon)
            .await
            .expect("create_coupon should succeed");

        let mut handles = Vec::new();

        for _ in 0..8 {
            let ctx = Arc::clone(&ctx);
            let product = lamp.uuid;

            handles.push(tokio::spawn(async move {
                let cart = helpers::create_session_cart(&ctx).await;

                ctx.app
                    .carts
                    .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(product, 1))
                    .await
                    .expect("add_item should succeed");
                ctx.app
                    .carts
                    .apply_coupon(ctx.tenant, cart.uuid, "LAST-ONE")
                    .await
                    .expect("apply_coupon should succeed");

                ctx.app
                    .orders
                    .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("task should not panic").is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1, "exactly one checkout may claim the last use");

        let coupon = ctx
            .app
            .coupons
            .get_coupon_by_code(ctx.tenant, "LAST-ONE")
            .await
            .expect("get_coupon_by_code should succeed");
        assert_eq!(coupon.used_count, 1);
    }

    #[tokio::test]
    async fn per_user_coupon_limit_is_enforced_at_checkout() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::from(100), 100).await;

        let mut coupon = helpers::new_fixed_coupon("ONCE-EACH", Decimal::from(10), None);
        coupon.usage_limit_per_user = Some(1);
        ctx.app
            .coupons
            .create_coupon(ctx.tenant, coupon)
            .await
            .expect("create_coupon should succeed");

        for attempt in 0..2 {
            let cart = helpers::create_cart(&ctx).await;

            ctx.app
                .carts
                .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 1))
                .await
                .expect("add_item should succeed");
            ctx.app
                .carts
                .apply_coupon(ctx.tenant, cart.uuid, "ONCE-EACH")
                .await
                .expect("apply_coupon should succeed");

            let result = ctx
                .app
                .orders
                .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
                .await;

            if attempt == 0 {
                result.expect("first redemption should succeed");
            } else {
                assert!(
                    matches!(result, Err(OrdersServiceError::CouponPerUserLimitReached)),
                    "expected CouponPerUserLimitReached, got {result:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn cancellation_restores_stock_and_cancels_the_pending_payment() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 10).await;
        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 3))
            .await
            .expect("add_item should succeed");

        let order = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await
            .expect("checkout should succeed");

        let cancelled = ctx
            .app
            .orders
            .cancel_order(ctx.tenant, order.uuid)
            .await
            .expect("cancel_order should succeed");

        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let product = ctx
            .app
            .products
            .get_product(ctx.tenant, lamp.uuid)
            .await
            .expect("get_product should succeed");
        assert_eq!(product.quantity, 10);

        let payment = ctx
            .app
            .payments
            .payment_for_order(ctx.tenant, order.uuid)
            .await
            .expect("payment_for_order should succeed");
        assert_eq!(payment.status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn illegal_status_transitions_are_rejected() {
        let ctx = TestContext::new().await;

        let lamp = helpers::create_product(&ctx, Decimal::new(25_00, 2), 10).await;
        let cart = helpers::create_cart(&ctx).await;
        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(lamp.uuid, 1))
            .await
            .expect("add_item should succeed");

        let order = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await
            .expect("checkout should succeed");

        let result = ctx
            .app
            .orders
            .update_status(ctx.tenant, order.uuid, OrderStatus::Shipped)
            .await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::InvalidTransition {
                    from: OrderStatus::Pending,
                    to: OrderStatus::Shipped,
                })
            ),
            "expected InvalidTransition, got {result:?}"
        );
    }
}
