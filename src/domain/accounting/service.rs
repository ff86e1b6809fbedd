//! Accounting service.
//!
//! The ledger derives entries from exactly three triggers: order creation,
//! payment completion and refund. Posting is idempotent per source and
//! category group, so replaying a trigger never duplicates entries. Entries
//! are append-only; reconciliation flags are the only permitted mutation.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    domain::{
        accounting::{
            errors::AccountingServiceError,
            models::{
                AccountingEntryRecord, AccountingEntryUuid, EntryCategory, EntryType, SourceRef,
            },
        },
        orders::models::OrderRecord,
        payments::models::PaymentRecord,
        tenants::models::TenantUuid,
    },
    money::CurrencyCode,
    store::{Db, TenantTransaction},
};

#[derive(Debug, Clone)]
pub struct MemAccountingService {
    db: Db,
}

impl MemAccountingService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn already_posted(
        tx: &TenantTransaction,
        source: SourceRef,
        categories: &[EntryCategory],
    ) -> bool {
        tx.state()
            .ledger
            .iter()
            .any(|entry| entry.source == source && categories.contains(&entry.category))
    }

    /// The rate into the tenant's reporting currency, frozen onto the entry.
    fn exchange_rate(tx: &TenantTransaction, currency: &CurrencyCode) -> Decimal {
        if *currency == tx.state().tenant.default_currency {
            Decimal::ONE
        } else {
            tx.state()
                .exchange_rates
                .get(currency)
                .copied()
                .unwrap_or(Decimal::ONE)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_entry(
        tx: &mut TenantTransaction,
        entry_type: EntryType,
        category: EntryCategory,
        amount: Decimal,
        currency: CurrencyCode,
        exchange_rate: Decimal,
        source: SourceRef,
        description: String,
        now: Timestamp,
    ) {
        if amount == Decimal::ZERO {
            return;
        }

        tx.state_mut().ledger.push(AccountingEntryRecord {
            uuid: AccountingEntryUuid::random(),
            entry_type,
            category,
            amount,
            currency,
            exchange_rate,
            source,
            description,
            reconciled: false,
            reconciled_by: None,
            reconciled_at: None,
            posted_at: now,
        });
    }
}

#[async_trait]
impl AccountingService for MemAccountingService {
    async fn post_order_created(
        &self,
        tenant: TenantUuid,
        order: &OrderRecord,
    ) -> Result<(), AccountingServiceError> {
        let now = Timestamp::now();
        let source = SourceRef::Order(order.uuid);

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if Self::already_posted(
            &tx,
            source,
            &[
                EntryCategory::Sales,
                EntryCategory::Tax,
                EntryCategory::Shipping,
                EntryCategory::Discounts,
            ],
        ) {
            return Ok(());
        }

        let rate = Self::exchange_rate(&tx, &order.currency);

        Self::push_entry(
            &mut tx,
            EntryType::Credit,
            EntryCategory::Sales,
            order.subtotal,
            order.currency.clone(),
            rate,
            source,
            format!("Order {} sales", order.number),
            now,
        );
        Self::push_entry(
            &mut tx,
            EntryType::Credit,
            EntryCategory::Tax,
            order.tax_amount,
            order.currency.clone(),
            rate,
            source,
            format!("Order {} tax collected", order.number),
            now,
        );
        Self::push_entry(
            &mut tx,
            EntryType::Credit,
            EntryCategory::Shipping,
            order.shipping_amount,
            order.currency.clone(),
            rate,
            source,
            format!("Order {} shipping", order.number),
            now,
        );
        Self::push_entry(
            &mut tx,
            EntryType::Debit,
            EntryCategory::Discounts,
            order.discount_amount,
            order.currency.clone(),
            rate,
            source,
            format!("Order {} discount", order.number),
            now,
        );

        tx.commit();

        tracing::info!(order = %order.number, "posted order-creation ledger entries");

        Ok(())
    }

    async fn post_payment_completed(
        &self,
        tenant: TenantUuid,
        payment: &PaymentRecord,
        fee: Decimal,
    ) -> Result<(), AccountingServiceError> {
        let now = Timestamp::now();
        let source = SourceRef::Payment(payment.uuid);

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if Self::already_posted(&tx, source, &[EntryCategory::Sales, EntryCategory::Fees]) {
            return Ok(());
        }

        let rate = Self::exchange_rate(&tx, &payment.currency);
        let reference = payment
            .transaction_id
            .clone()
            .unwrap_or_else(|| payment.uuid.to_string());

        Self::push_entry(
            &mut tx,
            EntryType::Debit,
            EntryCategory::Sales,
            payment.amount,
            payment.currency.clone(),
            rate,
            source,
            format!("Payment {reference} captured"),
            now,
        );
        Self::push_entry(
            &mut tx,
            EntryType::Debit,
            EntryCategory::Fees,
            fee,
            payment.currency.clone(),
            rate,
            source,
            format!("Payment {reference} processing fee"),
            now,
        );

        tx.commit();

        tracing::info!(payment = %payment.uuid, "posted payment-completion ledger entries");

        Ok(())
    }

    async fn post_refund(
        &self,
        tenant: TenantUuid,
        payment: &PaymentRecord,
        amount: Decimal,
    ) -> Result<(), AccountingServiceError> {
        let now = Timestamp::now();
        let source = SourceRef::Payment(payment.uuid);

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        if Self::already_posted(&tx, source, &[EntryCategory::Refunds]) {
            return Ok(());
        }

        let rate = Self::exchange_rate(&tx, &payment.currency);

        Self::push_entry(
            &mut tx,
            EntryType::Debit,
            EntryCategory::Refunds,
            amount,
            payment.currency.clone(),
            rate,
            source,
            format!("Refund against payment {}", payment.uuid),
            now,
        );

        tx.commit();

        tracing::info!(payment = %payment.uuid, %amount, "posted refund ledger entry");

        Ok(())
    }

    async fn reconcile(
        &self,
        tenant: TenantUuid,
        entry: AccountingEntryUuid,
        reconciled_by: &str,
    ) -> Result<AccountingEntryRecord, AccountingServiceError> {
        let now = Timestamp::now();

        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let record = tx
            .state_mut()
            .ledger
            .iter_mut()
            .find(|e| e.uuid == entry)
            .ok_or(AccountingServiceError::EntryNotFound)?;

        record.reconciled = true;
        record.reconciled_by = Some(reconciled_by.to_string());
        record.reconciled_at = Some(now);

        let record = record.clone();
        tx.commit();

        Ok(record)
    }

    async fn unreconcile(
        &self,
        tenant: TenantUuid,
        entry: AccountingEntryUuid,
    ) -> Result<AccountingEntryRecord, AccountingServiceError> {
        let mut tx = self.db.begin_tenant_transaction(tenant).await?;

        let record = tx
            .state_mut()
            .ledger
            .iter_mut()
            .find(|e| e.uuid == entry)
            .ok_or(AccountingServiceError::EntryNotFound)?;

        record.reconciled = false;
        record.reconciled_by = None;
        record.reconciled_at = None;

        let record = record.clone();
        tx.commit();

        Ok(record)
    }

    async fn entries_for(
        &self,
        tenant: TenantUuid,
        source: SourceRef,
    ) -> Result<Vec<AccountingEntryRecord>, AccountingServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        Ok(tx
            .state()
            .ledger
            .iter()
            .filter(|entry| entry.source == source)
            .cloned()
            .collect())
    }

    async fn list_entries(
        &self,
        tenant: TenantUuid,
    ) -> Result<Vec<AccountingEntryRecord>, AccountingServiceError> {
        let tx = self.db.begin_tenant_transaction(tenant).await?;

        Ok(tx.state().ledger.clone())
    }
}

#[automock]
#[async_trait]
pub trait AccountingService: Send + Sync {
    /// Posts the sales/tax/shipping/discount split for a newly created
    /// order. Idempotent per order.
    async fn post_order_created(
        &self,
        tenant: TenantUuid,
        order: &OrderRecord,
    ) -> Result<(), AccountingServiceError>;

    /// Posts the cash and processing-fee entries for a completed payment.
    /// Idempotent per payment.
    async fn post_payment_completed(
        &self,
        tenant: TenantUuid,
        payment: &PaymentRecord,
        fee: Decimal,
    ) -> Result<(), AccountingServiceError>;

    /// Posts the compensating debit for a refund. Idempotent per payment.
    async fn post_refund(
        &self,
        tenant: TenantUuid,
        payment: &PaymentRecord,
        amount: Decimal,
    ) -> Result<(), AccountingServiceError>;

    /// Marks an entry as verified against an external statement.
    async fn reconcile(
        &self,
        tenant: TenantUuid,
        entry: AccountingEntryUuid,
        reconciled_by: &str,
    ) -> Result<AccountingEntryRecord, AccountingServiceError>;

    /// Reverts a reconciliation.
    async fn unreconcile(
        &self,
        tenant: TenantUuid,
        entry: AccountingEntryUuid,
    ) -> Result<AccountingEntryRecord, AccountingServiceError>;

    /// All entries derived from one order or payment.
    async fn entries_for(
        &self,
        tenant: TenantUuid,
        source: SourceRef,
    ) -> Result<Vec<AccountingEntryRecord>, AccountingServiceError>;

    /// The tenant's full ledger, in posting order.
    async fn list_entries(
        &self,
        tenant: TenantUuid,
    ) -> Result<Vec<AccountingEntryRecord>, AccountingServiceError>;
}
