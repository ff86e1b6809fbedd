//! Payments service.
//!
//! Charges run in three phases: claim the payment (set `Processing` and
//! commit, so concurrent attempts see it in flight), call the gateway with
//! no store lock held and a bounded timeout, then record the outcome in a
//! second transaction. Refunds follow the same discipline through
//! `Refunding`, so a given payment reaches the gateway at most once at a
//! time. A timeout or transport failure during a charge is recorded as a
//! failed attempt; retry from `Failed` is the only resumption path.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rand::{Rng, distributions::Alphanumeric};
use rust_decimal::Decimal;
use serde_json::json;

use crate::{
    domain::{
        accounting::service::AccountingService,
        orders::{
            models::{OrderPaymentStatus, OrderStatus, OrderUuid},
            repository::MemOrdersRepository,
        },
        payments::{
            errors::PaymentsServiceError,
            gateway::{
                ChargeOutcome, ChargeRequest, GatewayError, PaymentGateway, RefundOutcome,
                RefundRequest,
            },
            models::{PaymentRecord, PaymentStatus, PaymentUuid},
            repository::MemPaymentsRepository,
        },
        tenants::models::TenantUuid,
    },
    store::{Db, TenantTransaction},
};

fn transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();

    format!("txn_{suffix}")
}

#[derive(Clone)]
pub struct MemPaymentsService {
    db: Db,
    gateway: Arc<dyn PaymentGateway>,
    accounting: Arc<dyn AccountingService>,
    gateway_timeout: Duration,
    orders: MemOrdersRepository,
    payments: MemPaymentsRepository,
}

impl MemPaymentsService {
    #[must_use]
    pub fn new(
        db: Db,
        gateway: Arc<dyn PaymentGateway>,
        accounting: Arc<dyn AccountingService>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            accounting,
            gateway_timeout,
            orders: MemOrdersRepository::new(),
            payments: MemPaymentsRepository::new(),
        }
    }

    /// Claims the payment for a charge attempt, runs the gateway call and
    /// records the outcome. Callers have already validated the starting
    /// status.
    async fn run_charge(
        &self,
        tenant: TenantUuid,
        payment_uuid: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        let now = Timestamp::now();

        // Phase 1: claim the payment, committed so concurrent attempts
        // refuse. The caller's guard ran in an earlier transaction and may
        // be stale by now, so the status is re-checked under this lock.
        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut payment = self
            .payments
            .get_payment(&tx, payment_uuid)
            .ok_or(PaymentsServiceError::NotFound)?;

        match payment.status {
            PaymentStatus::Pending | PaymentStatus::Failed => {}
            PaymentStatus::Processing => return Err(PaymentsServiceError::InFlight),
            PaymentStatus::Completed | PaymentStatus::Refunding => {
                return Err(PaymentsServiceError::AlreadyPaid);
            }
            PaymentStatus::Refunded => return Err(PaymentsServiceError::AlreadyRefunded),
            PaymentStatus::Cancelled => return Err(PaymentsServiceError::Cancelled),
        }

        payment.status = PaymentStatus::Processing;
        payment.transaction_id = Some(transaction_id());
        payment.updated_at = now;

        self.payments.update_payment(&mut tx, payment.clone());
        tx.commit();

        // Phase 2: the gateway call, with no store lock held.
        let request = ChargeRequest {
            transaction_id: payment
                .transaction_id
                .clone()
                .unwrap_or_default(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            method: payment.method,
            metadata: json!({ "order": payment.order_uuid.to_string() }),
        };

        let outcome = match tokio::time::timeout(self.gateway_timeout, self.gateway.charge(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };

        // Phase 3: record the outcome.
        match outcome {
            Ok(ChargeOutcome::Approved {
                transaction_id,
                raw,
            }) => {
                let payment = self
                    .record_success(tenant, payment_uuid, transaction_id, raw)
                    .await?;

                let fee = self.gateway.processing_fee(payment.amount);

                if let Err(error) = self
                    .accounting
                    .post_payment_completed(tenant, &payment, fee)
                    .await
                {
                    tracing::error!(
                        payment = %payment.uuid,
                        %error,
                        "payment-completion ledger posting failed; entries need manual reconciliation"
                    );
                }

                tracing::info!(payment = %payment.uuid, amount = %payment.amount, "payment completed");

                Ok(payment)
            }
            Ok(ChargeOutcome::Declined { code, message, raw }) => {
                self.record_failure(tenant, payment_uuid, Some(raw.clone()))
                    .await?;

                tracing::warn!(payment = %payment_uuid, %code, %message, ?raw, "payment declined");

                Err(PaymentsServiceError::Declined { message })
            }
            Err(error) => {
                self.record_failure(
                    tenant,
                    payment_uuid,
                    Some(json!({ "error": error.to_string() })),
                )
                .await?;

                tracing::warn!(payment = %payment_uuid, %error, "gateway failure during charge");

                Err(error.into())
            }
        }
    }

    async fn record_success(
        &self,
        tenant: TenantUuid,
        payment_uuid: PaymentUuid,
        gateway_transaction_id: String,
        raw: serde_json::Value,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut payment = self
            .payments
            .get_payment(&tx, payment_uuid)
            .ok_or(PaymentsServiceError::NotFound)?;

        payment.status = PaymentStatus::Completed;
        payment.transaction_id = Some(gateway_transaction_id);
        payment.gateway_response = Some(raw);
        payment.paid_at = Some(now);
        payment.updated_at = now;

        self.payments.update_payment(&mut tx, payment.clone());
        self.settle_order(&mut tx, payment.order_uuid, OrderPaymentStatus::Paid, now);

        tx.commit();

        Ok(payment)
    }

    async fn record_failure(
        &self,
        tenant: TenantUuid,
        payment_uuid: PaymentUuid,
        raw: Option<serde_json::Value>,
    ) -> Result<(), PaymentsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut payment = self
            .payments
            .get_payment(&tx, payment_uuid)
            .ok_or(PaymentsServiceError::NotFound)?;

        payment.status = PaymentStatus::Failed;
        payment.gateway_response = raw;
        payment.failed_at = Some(now);
        payment.updated_at = now;

        self.payments.update_payment(&mut tx, payment.clone());
        self.settle_order(&mut tx, payment.order_uuid, OrderPaymentStatus::Failed, now);

        tx.commit();

        Ok(())
    }

    /// Returns a claimed refund to `Completed` after a gateway decline or
    /// failure, so the refund can be attempted again.
    async fn release_refund_claim(
        &self,
        tenant: TenantUuid,
        payment_uuid: PaymentUuid,
    ) -> Result<(), PaymentsServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let mut payment = self
            .payments
            .get_payment(&tx, payment_uuid)
            .ok_or(PaymentsServiceError::NotFound)?;

        if payment.status == PaymentStatus::Refunding {
            payment.status = PaymentStatus::Completed;
            payment.updated_at = now;

            self.payments.update_payment(&mut tx, payment);
            tx.commit();
        }

        Ok(())
    }

    /// Couples the order's payment status (and, on success, its fulfilment
    /// status) to the payment outcome.
    fn settle_order(
        &self,
        tx: &mut TenantTransaction,
        order_uuid: OrderUuid,
        payment_status: OrderPaymentStatus,
        now: Timestamp,
    ) {
        let Some(mut order) = self.orders.get_order(tx, order_uuid) else {
            return;
        };

        order.payment_status = payment_status;

        if payment_status == OrderPaymentStatus::Paid
            && order.status.can_transition_to(OrderStatus::Confirmed)
        {
            order.status = OrderStatus::Confirmed;
        }

        if payment_status == OrderPaymentStatus::Refunded
            && order.status.can_transition_to(OrderStatus::Refunded)
        {
            order.status = OrderStatus::Refunded;
        }

        order.updated_at = now;
        self.orders.update_order(tx, order);
    }
}

#[async_trait]
impl PaymentsService for MemPaymentsService {
    #[tracing::instrument(skip(self), fields(%tenant, %payment))]
    async fn process_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        {
            let tx = self.db.begin_tenant_transaction(tenant).await?;

            let record = self
                .payments
                .get_payment(&tx, payment)
                .ok_or(PaymentsServiceError::NotFound)?;

            let order = self
                .orders
                .get_order(&tx, record.order_uuid)
                .ok_or(PaymentsServiceError::OrderNotFound)?;

            if order.payment_status == OrderPaymentStatus::Paid {
                return Err(PaymentsServiceError::AlreadyPaid);
            }
            if order.payment_status == OrderPaymentStatus::Refunded {
                return Err(PaymentsServiceError::AlreadyRefunded);
            }

            match record.status {
                PaymentStatus::Pending => {}
                PaymentStatus::Processing => return Err(PaymentsServiceError::InFlight),
                PaymentStatus::Completed | PaymentStatus::Refunding => {
                    return Err(PaymentsServiceError::AlreadyPaid);
                }
                PaymentStatus::Refunded => return Err(PaymentsServiceError::AlreadyRefunded),
                PaymentStatus::Failed => return Err(PaymentsServiceError::NotRetryable),
                PaymentStatus::Cancelled => return Err(PaymentsServiceError::Cancelled),
            }
        }

        self.run_charge(tenant, payment).await
    }

    #[tracing::instrument(skip(self), fields(%tenant, %payment))]
    async fn retry_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        {
            let tx = self.db.begin_tenant_transaction(tenant).await?;

            let record = self
                .payments
                .get_payment(&tx, payment)
                .ok_or(PaymentsServiceError::NotFound)?;

            if record.status != PaymentStatus::Failed {
                return Err(PaymentsServiceError::NotRetryable);
            }
        }

        self.run_charge(tenant, payment).await
    }

    #[tracing::instrument(skip(self, reason), fields(%tenant, %payment))]
    async fn refund_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
        amount: Option<Decimal>,
        reason: Option<String>,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        // The refund is claimed and committed before the gateway call, so a
        // concurrent refund of the same payment refuses instead of paying
        // out twice.
        let (record, refund_amount) = {
            let mut tx = self.db.begin_tenant_transaction(tenant).await?;

            let mut record = self
                .payments
                .get_payment(&tx, payment)
                .ok_or(PaymentsServiceError::NotFound)?;

            match record.status {
                PaymentStatus::Completed => {}
                PaymentStatus::Refunding => return Err(PaymentsServiceError::RefundInFlight),
                PaymentStatus::Refunded => return Err(PaymentsServiceError::AlreadyRefunded),
                _ => return Err(PaymentsServiceError::NotRefundable),
            }

            let refund_amount = amount.unwrap_or(record.amount);

            if refund_amount <= Decimal::ZERO || refund_amount > record.amount {
                return Err(PaymentsServiceError::RefundExceedsAmount);
            }

            record.status = PaymentStatus::Refunding;
            record.updated_at = Timestamp::now();

            self.payments.update_payment(&mut tx, record.clone());
            tx.commit();

            (record, refund_amount)
        };

        let request = RefundRequest {
            transaction_id: record.transaction_id.clone().unwrap_or_default(),
            amount: refund_amount,
        };

        let outcome =
            match tokio::time::timeout(self.gateway_timeout, self.gateway.refund(request)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout),
            };

        // A gateway failure or decline releases the claim; the payment
        // returns to completed and the refund can be retried.
        let (refund_id, raw) = match outcome {
            Ok(RefundOutcome::Approved { refund_id, raw }) => (refund_id, raw),
            Ok(RefundOutcome::Declined { code, message, raw }) => {
                tracing::warn!(payment = %record.uuid, %code, %message, ?raw, "refund declined");
                self.release_refund_claim(tenant, payment).await?;
                return Err(PaymentsServiceError::Declined { message });
            }
            Err(error) => {
                tracing::warn!(payment = %record.uuid, %error, "gateway failure during refund");
                self.release_refund_claim(tenant, payment).await?;
                return Err(error.into());
            }
        };

        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        // The claim is exclusive: nothing else mutates a refunding payment,
        // and the gateway has paid out by this point.
        let mut record = self
            .payments
            .get_payment(&tx, payment)
            .ok_or(PaymentsServiceError::NotFound)?;

        record.status = PaymentStatus::Refunded;
        record.refund_amount = Some(refund_amount);
        record.refund_reason = reason;
        record.refund_id = Some(refund_id);
        record.gateway_response = Some(raw);
        record.refunded_at = Some(now);
        record.updated_at = now;

        self.payments.update_payment(&mut tx, record.clone());
        self.settle_order(&mut tx, record.order_uuid, OrderPaymentStatus::Refunded, now);

        tx.commit();

        if let Err(error) = self.accounting.post_refund(tenant, &record, refund_amount).await {
            tracing::error!(
                payment = %record.uuid,
                %error,
                "refund ledger posting failed; entries need manual reconciliation"
            );
        }

        tracing::info!(payment = %record.uuid, amount = %refund_amount, "payment refunded");

        Ok(record)
    }

    async fn get_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        self.payments
            .get_payment(&tx, payment)
            .ok_or(PaymentsServiceError::NotFound)
    }

    async fn payment_for_order(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        self.payments
            .latest_for_order(&tx, order)
            .ok_or(PaymentsServiceError::NotFound)
    }
}

#[automock]
#[async_trait]
pub trait PaymentsService: Send + Sync {
    /// Charges a pending payment through the gateway.
    async fn process_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError>;

    /// Re-attempts a failed payment with a fresh transaction id.
    async fn retry_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError>;

    /// Refunds a completed payment, fully or partially.
    async fn refund_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
        amount: Option<Decimal>,
        reason: Option<String>,
    ) -> Result<PaymentRecord, PaymentsServiceError>;

    /// Fetches a payment.
    async fn get_payment(
        &self,
        tenant: TenantUuid,
        payment: PaymentUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError>;

    /// The most recent payment row for an order.
    async fn payment_for_order(
        &self,
        tenant: TenantUuid,
        order: OrderUuid,
    ) -> Result<PaymentRecord, PaymentsServiceError>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::{
        domain::{
            accounting::{
                models::{EntryCategory, EntryType, SourceRef},
                service::MemAccountingService,
            },
            orders::models::OrderPaymentStatus,
            payments::gateway::{MockPaymentGateway, SimulatedGateway},
        },
        test::{TestContext, helpers},
    };

    use super::*;

    async fn checked_out_payment(ctx: &TestContext, price: Decimal) -> PaymentRecord {
        let product = helpers::create_product(ctx, price, 10).await;
        let cart = helpers::create_cart(ctx).await;

        ctx.app
            .carts
            .add_item(ctx.tenant, cart.uuid, helpers::new_cart_item(product.uuid, 1))
            .await
            .expect("add_item should succeed");

        let order = ctx
            .app
            .orders
            .checkout(ctx.tenant, helpers::checkout_request(cart.uuid))
            .await
            .expect("checkout should succeed");

        ctx.app
            .payments
            .payment_for_order(ctx.tenant, order.uuid)
            .await
            .expect("payment_for_order should succeed")
    }

    /// Approving gateway that counts calls and holds each one briefly, to
    /// widen the interleavings in concurrency tests.
    struct SlowCountingGateway {
        charges: AtomicUsize,
        refunds: AtomicUsize,
        hold: Duration,
    }

    impl SlowCountingGateway {
        fn new(hold: Duration) -> Self {
            Self {
                charges: AtomicUsize::new(0),
                refunds: AtomicUsize::new(0),
                hold,
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for SlowCountingGateway {
        async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
            self.charges.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;

            Ok(ChargeOutcome::Approved {
                transaction_id: request.transaction_id,
                raw: json!({ "result": "approved" }),
            })
        }

        async fn refund(&self, request: RefundRequest) -> Result<RefundOutcome, GatewayError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;

            Ok(RefundOutcome::Approved {
                refund_id: format!("re_{}", request.transaction_id),
                raw: json!({ "result": "refunded" }),
            })
        }

        fn processing_fee(&self, _amount: Decimal) -> Decimal {
            Decimal::ZERO
        }
    }

    fn counting_service(
        ctx: &TestContext,
        gateway: Arc<SlowCountingGateway>,
    ) -> Arc<MemPaymentsService> {
        Arc::new(MemPaymentsService::new(
            ctx.db.clone(),
            gateway,
            Arc::new(MemAccountingService::new(ctx.db.clone())),
            Duration::from_secs(5),
        ))
    }

    fn declining_service(ctx: &TestContext, limit: Decimal) -> MemPaymentsService {
        MemPaymentsService::new(
            ctx.db.clone(),
            Arc::new(SimulatedGateway::declining_above(limit)),
            Arc::new(MemAccountingService::new(ctx.db.clone())),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn successful_payment_confirms_the_order() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        let paid = ctx
            .app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await
            .expect("process_payment should succeed");

        assert_eq!(paid.status, PaymentStatus::Completed);
        assert!(paid.paid_at.is_some());
        assert!(paid.transaction_id.is_some());

        let order = ctx
            .app
            .orders
            .get_order(ctx.tenant, paid.order_uuid)
            .await
            .expect("get_order should succeed");
        assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Confirmed);

        // Cash and fee entries were posted against the payment.
        let entries = ctx
            .app
            .accounting
            .entries_for(ctx.tenant, SourceRef::Payment(paid.uuid))
            .await
            .expect("entries_for should succeed");
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.category == EntryCategory::Fees));
    }

    #[tokio::test]
    async fn decline_fails_the_payment_and_surfaces_the_message() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(1_000)).await;

        let service = declining_service(&ctx, Decimal::from(500));

        let result = service.process_payment(ctx.tenant, payment.uuid).await;

        assert!(
            matches!(
                result,
                Err(PaymentsServiceError::Declined { ref message }) if message.contains("declined")
            ),
            "expected Declined, got {result:?}"
        );

        let failed = ctx
            .app
            .payments
            .get_payment(ctx.tenant, payment.uuid)
            .await
            .expect("get_payment should succeed");
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert!(failed.failed_at.is_some());
        assert!(failed.gateway_response.is_some());

        let order = ctx
            .app
            .orders
            .get_order(ctx.tenant, payment.order_uuid)
            .await
            .expect("get_order should succeed");
        assert_eq!(order.payment_status, OrderPaymentStatus::Failed);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn gateway_failure_is_recorded_as_a_failed_attempt() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_charge()
            .times(1)
            .returning(|_| Err(GatewayError::Timeout));

        let service = MemPaymentsService::new(
            ctx.db.clone(),
            Arc::new(gateway),
            Arc::new(MemAccountingService::new(ctx.db.clone())),
            Duration::from_secs(5),
        );

        let result = service.process_payment(ctx.tenant, payment.uuid).await;

        assert!(
            matches!(result, Err(PaymentsServiceError::Gateway(GatewayError::Timeout))),
            "expected Gateway(Timeout), got {result:?}"
        );

        let failed = ctx
            .app
            .payments
            .get_payment(ctx.tenant, payment.uuid)
            .await
            .expect("get_payment should succeed");
        assert_eq!(failed.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn retry_succeeds_with_a_fresh_transaction_id() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(1_000)).await;

        let declining = declining_service(&ctx, Decimal::from(500));
        let _ = declining.process_payment(ctx.tenant, payment.uuid).await;

        let failed = ctx
            .app
            .payments
            .get_payment(ctx.tenant, payment.uuid)
            .await
            .expect("get_payment should succeed");
        assert_eq!(failed.status, PaymentStatus::Failed);
        let failed_txn = failed.transaction_id.clone();

        let paid = ctx
            .app
            .payments
            .retry_payment(ctx.tenant, payment.uuid)
            .await
            .expect("retry should succeed against the approving gateway");

        assert_eq!(paid.status, PaymentStatus::Completed);
        assert_ne!(paid.transaction_id, failed_txn);
    }

    #[tokio::test]
    async fn retry_is_only_legal_from_failed() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        let result = ctx
            .app
            .payments
            .retry_payment(ctx.tenant, payment.uuid)
            .await;

        assert!(
            matches!(result, Err(PaymentsServiceError::NotRetryable)),
            "expected NotRetryable, got {result:?}"
        );
    }

    #[tokio::test]
    async fn paying_twice_is_refused() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        ctx.app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await
            .expect("process_payment should succeed");

        let result = ctx
            .app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await;

        assert!(
            matches!(result, Err(PaymentsServiceError::AlreadyPaid)),
            "expected AlreadyPaid, got {result:?}"
        );
    }

    #[tokio::test]
    async fn full_refund_refunds_payment_and_order_with_one_ledger_debit() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        ctx.app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await
            .expect("process_payment should succeed");

        let refunded = ctx
            .app
            .payments
            .refund_payment(
                ctx.tenant,
                payment.uuid,
                None,
                Some("customer request".to_string()),
            )
            .await
            .expect("refund_payment should succeed");

        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert_eq!(refunded.refund_amount, Some(Decimal::from(100)));
        assert_eq!(refunded.refund_reason.as_deref(), Some("customer request"));
        assert!(refunded.refunded_at.is_some());

        let order = ctx
            .app
            .orders
            .get_order(ctx.tenant, refunded.order_uuid)
            .await
            .expect("get_order should succeed");
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.payment_status, OrderPaymentStatus::Refunded);

        let refund_entries: Vec<_> = ctx
            .app
            .accounting
            .entries_for(ctx.tenant, SourceRef::Payment(refunded.uuid))
            .await
            .expect("entries_for should succeed")
            .into_iter()
            .filter(|e| e.category == EntryCategory::Refunds)
            .collect();

        assert_eq!(refund_entries.len(), 1);
        assert_eq!(refund_entries[0].entry_type, EntryType::Debit);
        assert_eq!(refund_entries[0].amount, Decimal::from(100));
    }

    #[tokio::test]
    async fn refund_cannot_exceed_the_captured_amount() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        ctx.app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await
            .expect("process_payment should succeed");

        let result = ctx
            .app
            .payments
            .refund_payment(ctx.tenant, payment.uuid, Some(Decimal::from(101)), None)
            .await;

        assert!(
            matches!(result, Err(PaymentsServiceError::RefundExceedsAmount)),
            "expected RefundExceedsAmount, got {result:?}"
        );
    }

    #[tokio::test]
    async fn refund_requires_a_completed_payment() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        let result = ctx
            .app
            .payments
            .refund_payment(ctx.tenant, payment.uuid, None, None)
            .await;

        assert!(
            matches!(result, Err(PaymentsServiceError::NotRefundable)),
            "expected NotRefundable, got {result:?}"
        );
    }

    #[tokio::test]
    async fn concurrent_refunds_reach_the_gateway_once() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        ctx.app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await
            .expect("process_payment should succeed");

        let gateway = Arc::new(SlowCountingGateway::new(Duration::from_millis(100)));
        let service = counting_service(&ctx, gateway.clone());

        let spawn_refund = |service: Arc<MemPaymentsService>| {
            let tenant = ctx.tenant;
            let uuid = payment.uuid;
            tokio::spawn(async move { service.refund_payment(tenant, uuid, None, None).await })
        };

        let a = spawn_refund(service.clone());
        let b = spawn_refund(service);

        let a = a.await.expect("task should not panic");
        let b = b.await.expect("task should not panic");

        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 1);
        assert_eq!(
            usize::from(a.is_ok()) + usize::from(b.is_ok()),
            1,
            "exactly one refund should succeed: {a:?} / {b:?}"
        );

        let refused = if a.is_ok() { b } else { a };
        assert!(
            matches!(
                refused,
                Err(PaymentsServiceError::RefundInFlight
                    | PaymentsServiceError::AlreadyRefunded)
            ),
            "expected RefundInFlight or AlreadyRefunded, got {refused:?}"
        );

        let settled = ctx
            .app
            .payments
            .get_payment(ctx.tenant, payment.uuid)
            .await
            .expect("get_payment should succeed");
        assert_eq!(settled.status, PaymentStatus::Refunded);
        assert_eq!(settled.refund_amount, Some(Decimal::from(100)));
    }

    #[tokio::test]
    async fn concurrent_charges_reach_the_gateway_once() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        let gateway = Arc::new(SlowCountingGateway::new(Duration::from_millis(100)));
        let service = counting_service(&ctx, gateway.clone());

        let spawn_charge = |service: Arc<MemPaymentsService>| {
            let tenant = ctx.tenant;
            let uuid = payment.uuid;
            tokio::spawn(async move { service.process_payment(tenant, uuid).await })
        };

        let a = spawn_charge(service.clone());
        let b = spawn_charge(service);

        let a = a.await.expect("task should not panic");
        let b = b.await.expect("task should not panic");

        assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
        assert_eq!(
            usize::from(a.is_ok()) + usize::from(b.is_ok()),
            1,
            "exactly one charge should succeed: {a:?} / {b:?}"
        );

        let refused = if a.is_ok() { b } else { a };
        assert!(
            matches!(
                refused,
                Err(PaymentsServiceError::InFlight | PaymentsServiceError::AlreadyPaid)
            ),
            "expected InFlight or AlreadyPaid, got {refused:?}"
        );

        let settled = ctx
            .app
            .payments
            .get_payment(ctx.tenant, payment.uuid)
            .await
            .expect("get_payment should succeed");
        assert_eq!(settled.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn declined_refund_releases_the_payment_for_retry() {
        let ctx = TestContext::new().await;
        let payment = checked_out_payment(&ctx, Decimal::from(100)).await;

        ctx.app
            .payments
            .process_payment(ctx.tenant, payment.uuid)
            .await
            .expect("process_payment should succeed");

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_refund().times(1).returning(|_| {
            Ok(RefundOutcome::Declined {
                code: "refund_refused".to_string(),
                message: "The issuer refused the refund".to_string(),
                raw: json!({ "result": "declined" }),
            })
        });

        let service = MemPaymentsService::new(
            ctx.db.clone(),
            Arc::new(gateway),
            Arc::new(MemAccountingService::new(ctx.db.clone())),
            Duration::from_secs(5),
        );

        let result = service
            .refund_payment(ctx.tenant, payment.uuid, None, None)
            .await;

        assert!(
            matches!(result, Err(PaymentsServiceError::Declined { .. })),
            "expected Declined, got {result:?}"
        );

        let released = ctx
            .app
            .payments
            .get_payment(ctx.tenant, payment.uuid)
            .await
            .expect("get_payment should succeed");
        assert_eq!(released.status, PaymentStatus::Completed);

        let refunded = ctx
            .app
            .payments
            .refund_payment(ctx.tenant, payment.uuid, None, None)
            .await
            .expect("retrying the refund should succeed");
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }
}
