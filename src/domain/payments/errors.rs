//! Payments service errors.

use thiserror::Error;

use crate::{domain::payments::gateway::GatewayError, store::StoreError};

#[derive(Debug, Error)]
pub enum PaymentsServiceError {
    #[error("payment not found")]
    NotFound,

    #[error("order not found")]
    OrderNotFound,

    #[error("order is already paid")]
    AlreadyPaid,

    #[error("order is already refunded")]
    AlreadyRefunded,

    #[error("a payment attempt is already in flight")]
    InFlight,

    #[error("only failed payments can be retried")]
    NotRetryable,

    #[error("payment was cancelled")]
    Cancelled,

    #[error("only completed payments can be refunded")]
    NotRefundable,

    #[error("a refund is already in flight")]
    RefundInFlight,

    #[error("refund amount exceeds the captured amount")]
    RefundExceedsAmount,

    /// A business-level gateway decline, carrying the gateway's user-safe
    /// message.
    #[error("payment declined: {message}")]
    Declined { message: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
