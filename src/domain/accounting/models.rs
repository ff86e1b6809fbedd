//! Accounting Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{orders::models::OrderUuid, payments::models::PaymentUuid},
    money::CurrencyCode,
    uuids::TypedUuid,
};

/// Accounting Entry UUID
pub type AccountingEntryUuid = TypedUuid<AccountingEntryRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Sales,
    Purchases,
    Expenses,
    Tax,
    Shipping,
    Discounts,
    Refunds,
    Fees,
}

/// The business record an entry was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef {
    Order(OrderUuid),
    Payment(PaymentUuid),
}

/// One ledger line. Entries are append-only; after posting, only the
/// reconciliation fields ever change.
#[derive(Debug, Clone)]
pub struct AccountingEntryRecord {
    pub uuid: AccountingEntryUuid,
    pub entry_type: EntryType,
    pub category: EntryCategory,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    /// Rate into the tenant's reporting currency at post time. Later rate
    /// changes never alter historical entries.
    pub exchange_rate: Decimal,
    pub source: SourceRef,
    pub description: String,
    pub reconciled: bool,
    pub reconciled_by: Option<String>,
    pub reconciled_at: Option<Timestamp>,
    pub posted_at: Timestamp,
}
