//! Processor status mapping
//!
//! Translates a `(response status, transaction type)` pair into a local
//! payment state. The transaction type must come from `verify_payment`,
//! never from the callback's own claim, so a spoofed callback cannot talk
//! its way into a stronger state.

use crate::payment::PaymentState;
use crate::processor::types::{ResponseStatus, TransactionType};
use tracing::warn;

/// Map a processor outcome to a local payment state.
///
/// Returns `None` when an approved transaction carries a type this gateway
/// does not handle; the caller must treat that as an explicit no-op.
pub fn map_status(
    status: &ResponseStatus,
    tran_type: Option<TransactionType>,
    resp_message: &str,
) -> Option<PaymentState> {
    match status {
        ResponseStatus::Approved => match tran_type {
            Some(TransactionType::Sale) => Some(PaymentState::Completed),
            Some(TransactionType::Auth) => Some(PaymentState::Authorization),
            Some(TransactionType::Capture) => Some(PaymentState::Completed),
            Some(TransactionType::Refund) => Some(PaymentState::Refunded),
            Some(TransactionType::Void) => Some(PaymentState::AuthorizationVoided),
            None => {
                warn!("approved transaction with unrecognized type, skipping state transition");
                None
            }
        },
        ResponseStatus::Cancelled => Some(PaymentState::Cancelled),
        ResponseStatus::Other(code) => {
            warn!(code = %code, message = %resp_message, "non-approved processor status");
            Some(PaymentState::Remote(resp_message.to_string()))
        }
    }
}
