//! Payment gateway port
//!
//! The gateway boundary is a trait so payment processing can be tested
//! against mocks and the rest of the system stays ignorant of any provider.
//! A business decline is an [`ChargeOutcome::Declined`] value, never an
//! error; [`GatewayError`] is reserved for infrastructure failure.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::{
    domain::payments::models::PaymentMethod,
    money::{CurrencyCode, round_money},
};

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub method: PaymentMethod,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    Approved {
        transaction_id: String,
        raw: serde_json::Value,
    },
    Declined {
        code: String,
        message: String,
        raw: serde_json::Value,
    },
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    /// The gateway transaction reference of the original charge.
    pub transaction_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub enum RefundOutcome {
    Approved {
        refund_id: String,
        raw: serde_json::Value,
    },
    Declined {
        code: String,
        message: String,
        raw: serde_json::Value,
    },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway timed out")]
    Timeout,

    #[error("gateway transport failure: {0}")]
    Transport(String),
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempts to capture funds.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    /// Returns funds against a previously approved charge.
    async fn refund(&self, request: RefundRequest) -> Result<RefundOutcome, GatewayError>;

    /// The fee the gateway takes for processing `amount`.
    fn processing_fee(&self, amount: Decimal) -> Decimal;
}

/// A deterministic in-process gateway: approves every charge unless it
/// exceeds a configured ceiling, and charges a flat percentage fee.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    decline_above: Option<Decimal>,
    fee_percent: Decimal,
}

impl SimulatedGateway {
    /// Approves everything, 2.9% fee.
    #[must_use]
    pub fn approving() -> Self {
        Self {
            decline_above: None,
            fee_percent: Decimal::new(2_9, 1),
        }
    }

    /// Declines any charge above `limit`.
    #[must_use]
    pub fn declining_above(limit: Decimal) -> Self {
        Self {
            decline_above: Some(limit),
            fee_percent: Decimal::new(2_9, 1),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        if self
            .decline_above
            .is_some_and(|limit| request.amount > limit)
        {
            return Ok(ChargeOutcome::Declined {
                code: "card_declined".to_string(),
                message: "The card was declined".to_string(),
                raw: json!({
                    "transaction_id": request.transaction_id,
                    "result": "declined",
                }),
            });
        }

        Ok(ChargeOutcome::Approved {
            transaction_id: request.transaction_id.clone(),
            raw: json!({
                "transaction_id": request.transaction_id,
                "result": "approved",
                "amount": request.amount,
                "currency": request.currency.as_str(),
            }),
        })
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundOutcome, GatewayError> {
        Ok(RefundOutcome::Approved {
            refund_id: format!("re_{}", request.transaction_id),
            raw: json!({
                "transaction_id": request.transaction_id,
                "result": "refunded",
                "amount": request.amount,
            }),
        })
    }

    fn processing_fee(&self, amount: Decimal) -> Decimal {
        round_money(amount * self.fee_percent / Decimal::ONE_HUNDRED)
    }
}
