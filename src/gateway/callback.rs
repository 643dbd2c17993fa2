//! Callback validation
//!
//! Both callback paths (synchronous browser return and asynchronous
//! server-to-server notification) pass through here before anything else.
//! The processor signature check is mandatory and blocking: a callback that
//! fails it is rejected without touching any payment record.

use crate::error::{GatewayError, GatewayResult};
use crate::processor::types::{CallbackFields, ResponseStatus};
use crate::processor::ProcessorClient;
use std::sync::Arc;
use tracing::warn;

/// A callback that passed signature validation and carries the fields the
/// reconciliation path needs.
#[derive(Debug, Clone)]
pub struct AcceptedCallback {
    pub tran_ref: String,
    pub resp_status: ResponseStatus,
    pub resp_message: String,
    pub cart_id: String,
}

pub struct CallbackValidator {
    processor: Arc<dyn ProcessorClient>,
}

impl CallbackValidator {
    pub fn new(processor: Arc<dyn ProcessorClient>) -> Self {
        Self { processor }
    }

    pub fn validate(&self, fields: &CallbackFields) -> GatewayResult<AcceptedCallback> {
        if !self.processor.is_valid_redirect(fields) {
            warn!("rejected callback with invalid signature");
            return Err(GatewayError::InvalidCallback(
                "signature validation failed".to_string(),
            ));
        }

        let tran_ref = fields
            .tran_ref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::InvalidCallback("missing tranRef".to_string()))?;
        let resp_status = fields
            .resp_status()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::InvalidCallback("missing respStatus".to_string()))?;
        let cart_id = fields
            .cart_id()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::InvalidCallback("missing cartId".to_string()))?;

        Ok(AcceptedCallback {
            tran_ref: tran_ref.to_string(),
            resp_status: ResponseStatus::from_code(resp_status),
            resp_message: fields.resp_message().to_string(),
            cart_id: cart_id.to_string(),
        })
    }
}
