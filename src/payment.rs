//! Local payment records
//!
//! A `Payment` mirrors one processor transaction outcome for an order. The
//! reconciliation engine guarantees at most one record per
//! `(order_id, remote_id, remote_state)` triple.

use crate::money::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a payment record.
///
/// `Remote` carries the processor's human-readable response message for
/// outcomes that do not map onto a known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PaymentState {
    Pending,
    Authorization,
    Completed,
    PartiallyRefunded,
    Refunded,
    AuthorizationVoided,
    Cancelled,
    Remote(String),
}

impl PaymentState {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Authorization => "authorization",
            PaymentState::Completed => "completed",
            PaymentState::PartiallyRefunded => "partially_refunded",
            PaymentState::Refunded => "refunded",
            PaymentState::AuthorizationVoided => "authorization_voided",
            PaymentState::Cancelled => "cancelled",
            PaymentState::Remote(message) => message,
        }
    }
}

impl From<String> for PaymentState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => PaymentState::Pending,
            "authorization" => PaymentState::Authorization,
            "completed" => PaymentState::Completed,
            "partially_refunded" => PaymentState::PartiallyRefunded,
            "refunded" => PaymentState::Refunded,
            "authorization_voided" => PaymentState::AuthorizationVoided,
            "cancelled" => PaymentState::Cancelled,
            _ => PaymentState::Remote(value),
        }
    }
}

impl From<PaymentState> for String {
    fn from(value: PaymentState) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment record entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    /// Owning order; immutable after creation
    pub order_id: String,
    pub state: PaymentState,
    pub amount: Price,
    /// Monotonically non-decreasing, never exceeds `amount`
    pub refunded_amount: Price,
    /// Processor transaction reference; reassigned on capture/void success
    pub remote_id: String,
    /// Last-seen processor response status code
    pub remote_state: String,
    pub authorized_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        order_id: &str,
        state: PaymentState,
        amount: Price,
        remote_id: &str,
        remote_state: &str,
    ) -> Self {
        let refunded_amount = Price::zero(amount.currency());
        Self {
            id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            state,
            amount,
            refunded_amount,
            remote_id: remote_id.to_string(),
            remote_state: remote_state.to_string(),
            authorized_at: Utc::now(),
        }
    }

    /// Outstanding balance: amount minus what has already been refunded.
    pub fn balance(&self) -> Price {
        self.amount
            .checked_sub(&self.refunded_amount)
            .unwrap_or_else(|_| Price::zero(self.amount.currency()))
    }
}
