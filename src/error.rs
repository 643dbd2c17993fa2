//! Gateway error taxonomy
//!
//! Validation and amount errors are raised before any external call is made.
//! Processor errors carry the transaction reference they relate to so the
//! failure can be audited against the processor's dashboard; they are never
//! swallowed.

use crate::money::MoneyError;
use crate::store::StoreError;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or incomplete input to the request builder
    #[error("invalid payment request: {0}")]
    Validation(String),

    /// Inbound callback rejected before any record was read or written
    #[error("callback rejected: {0}")]
    InvalidCallback(String),

    /// Follow-up amount exceeds the payment's outstanding balance
    #[error("cannot {operation} more than {balance}, requested {requested}")]
    AmountExceeded {
        operation: &'static str,
        requested: String,
        balance: String,
    },

    /// Payment is not in a valid source state for the requested operation
    #[error("payment state is '{actual}', expected one of [{expected}]")]
    InvalidState { expected: String, actual: String },

    /// Processor call failed, timed out, or returned an unusable response
    #[error(
        "processor request failed for transaction '{}': {message}",
        .reference.as_deref().unwrap_or("<unsent>")
    )]
    Processor {
        reference: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    pub fn processor(reference: Option<&str>, message: impl Into<String>) -> Self {
        GatewayError::Processor {
            reference: reference.map(str::to_string),
            message: message.into(),
        }
    }
}
