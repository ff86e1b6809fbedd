//! Payment Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{domain::orders::models::OrderUuid, money::CurrencyCode, uuids::TypedUuid};

/// Payment UUID
pub type PaymentUuid = TypedUuid<PaymentRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    /// A refund has been claimed and is in flight at the gateway.
    Refunding,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
}

/// One payment attempt chain against an order. Checkout creates the row in
/// `Pending`; processing, retry and refund move it through the status
/// machine.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub uuid: PaymentUuid,
    pub order_uuid: OrderUuid,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub method: PaymentMethod,
    /// Our reference sent to the gateway; regenerated on every retry.
    pub transaction_id: Option<String>,
    /// Raw gateway payload from the most recent charge attempt.
    pub gateway_response: Option<serde_json::Value>,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    pub refund_id: Option<String>,
    pub paid_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
