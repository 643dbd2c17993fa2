//! Follow-up orchestrator
//!
//! Drives capture, refund, and void requests against existing transactions.
//! Every operation checks the payment's source state and the requested
//! amount against its outstanding balance before the processor is called,
//! and only mutates local records after a definitive success response.
//! Operations against the same payment are mutually exclusive.

use crate::error::{GatewayError, GatewayResult};
use crate::money::Price;
use crate::payment::{Payment, PaymentState};
use crate::processor::types::{FollowupRequest, TransactionClass, TransactionType};
use crate::processor::ProcessorClient;
use crate::store::PaymentStore;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of a follow-up operation.
#[derive(Debug, Clone)]
pub enum FollowupOutcome {
    /// The payment was updated in place.
    Applied(Payment),
    /// Partial capture: the authorization was reduced and a new completed
    /// payment was created for the captured amount.
    Split { original: Payment, capture: Payment },
    /// The processor acknowledged the request but has not settled it.
    /// No local state was changed; the operator must follow up manually.
    Pending { message: String },
}

pub struct FollowupOrchestrator {
    processor: Arc<dyn ProcessorClient>,
    payments: Arc<dyn PaymentStore>,
    // Per-payment mutual exclusion so two follow-ups cannot read the same
    // balance concurrently.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl FollowupOrchestrator {
    pub fn new(processor: Arc<dyn ProcessorClient>, payments: Arc<dyn PaymentStore>) -> Self {
        Self {
            processor,
            payments,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn payment_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id).or_default().clone()
    }

    /// Drop the map entry once no task holds a clone of it anymore, so the
    /// map does not grow with every payment ever followed up.
    async fn release_payment_lock(&self, id: Uuid) {
        let mut locks = self.locks.lock().await;
        if locks.get(&id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&id);
        }
    }

    async fn load_payment(&self, id: Uuid) -> GatewayResult<Payment> {
        self.payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| {
                GatewayError::Store(crate::store::StoreError::not_found(
                    "Payment",
                    id.to_string(),
                ))
            })
    }

    fn assert_state(payment: &Payment, allowed: &[PaymentState]) -> GatewayResult<()> {
        if !allowed.contains(&payment.state) {
            return Err(GatewayError::InvalidState {
                expected: allowed
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                actual: payment.state.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn assert_amount(
        payment: &Payment,
        amount: &Price,
        operation: &'static str,
    ) -> GatewayResult<()> {
        let balance = payment.balance();
        if amount.exceeds(&balance)? {
            return Err(GatewayError::AmountExceeded {
                operation,
                requested: amount.to_string(),
                balance: balance.to_string(),
            });
        }
        Ok(())
    }

    fn build_request(
        payment: &Payment,
        tran_type: TransactionType,
        amount: &Price,
        note: &str,
    ) -> GatewayResult<FollowupRequest> {
        let rounded = amount.rounded();
        let cart_amount = rounded.amount().to_f64().ok_or_else(|| {
            GatewayError::Validation("follow-up amount is not representable".to_string())
        })?;
        Ok(FollowupRequest {
            tran_type,
            tran_class: TransactionClass::Ecom,
            cart_id: payment.order_id.clone(),
            cart_currency: rounded.currency().to_string(),
            cart_amount,
            cart_description: note.to_string(),
            tran_ref: payment.remote_id.clone(),
        })
    }

    /// Refund part or all of a completed payment. `amount` defaults to the
    /// full payment amount.
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: Option<Price>,
    ) -> GatewayResult<FollowupOutcome> {
        let lock = self.payment_lock(payment_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.refund_locked(payment_id, amount).await
        };
        drop(lock);
        self.release_payment_lock(payment_id).await;
        result
    }

    async fn refund_locked(
        &self,
        payment_id: Uuid,
        amount: Option<Price>,
    ) -> GatewayResult<FollowupOutcome> {
        let mut payment = self.load_payment(payment_id).await?;
        Self::assert_state(
            &payment,
            &[PaymentState::Completed, PaymentState::PartiallyRefunded],
        )?;

        let amount = amount.unwrap_or_else(|| payment.amount.clone());
        Self::assert_amount(&payment, &amount, "refund")?;

        let request =
            Self::build_request(&payment, TransactionType::Refund, &amount, "refunded by merchant")?;
        let result = self.processor.request_followup(&request).await.map_err(|e| {
            error!(
                "failed to proceed to refund transaction: {}: {}",
                payment.remote_id, e
            );
            e
        })?;

        if result.success {
            let new_refunded = payment.refunded_amount.checked_add(&amount)?;
            payment.state = if payment.amount.exceeds(&new_refunded)? {
                PaymentState::PartiallyRefunded
            } else {
                PaymentState::Refunded
            };
            payment.refunded_amount = new_refunded;
            let payment = self.payments.update(&payment).await?;
            info!(payment_id = %payment.id, state = %payment.state, "refund applied");
            Ok(FollowupOutcome::Applied(payment))
        } else if result.pending_success {
            warn!(
                tran_ref = %payment.remote_id,
                "refund pending at processor: {}", result.message
            );
            Ok(FollowupOutcome::Pending {
                message: result.message,
            })
        } else {
            Err(GatewayError::processor(
                Some(&payment.remote_id),
                result.message,
            ))
        }
    }

    /// Capture part or all of an authorization. `amount` defaults to the
    /// full authorized amount. A partial capture reduces the authorization
    /// record and creates a new completed payment for the captured amount
    /// under the processor's new transaction reference.
    pub async fn capture(
        &self,
        payment_id: Uuid,
        amount: Option<Price>,
    ) -> GatewayResult<FollowupOutcome> {
        let lock = self.payment_lock(payment_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.capture_locked(payment_id, amount).await
        };
        drop(lock);
        self.release_payment_lock(payment_id).await;
        result
    }

    async fn capture_locked(
        &self,
        payment_id: Uuid,
        amount: Option<Price>,
    ) -> GatewayResult<FollowupOutcome> {
        let mut payment = self.load_payment(payment_id).await?;
        Self::assert_state(&payment, &[PaymentState::Authorization])?;

        let amount = amount.unwrap_or_else(|| payment.amount.clone());
        Self::assert_amount(&payment, &amount, "capture")?;

        let request =
            Self::build_request(&payment, TransactionType::Capture, &amount, "captured by merchant")?;
        let result = self.processor.request_followup(&request).await.map_err(|e| {
            error!(
                "failed to proceed to capture transaction: {}: {}",
                payment.remote_id, e
            );
            e
        })?;

        if result.success {
            if amount.cmp_checked(&payment.amount)? == Ordering::Less {
                // Partial capture: the remaining authorization stays on the
                // original record, the captured slice becomes its own payment.
                payment.amount = payment.amount.checked_sub(&amount)?;
                let original = self.payments.update(&payment).await?;

                let capture = Payment::new(
                    &result.cart_id,
                    PaymentState::Completed,
                    amount,
                    &result.tran_ref,
                    &result.response_status,
                );
                info!(
                    "Saving payment information. Transaction reference: {}",
                    result.tran_ref
                );
                let capture = self.payments.insert(&capture).await?;
                info!(
                    "Payment information saved successfully. Transaction reference: {}",
                    result.tran_ref
                );
                Ok(FollowupOutcome::Split { original, capture })
            } else {
                payment.state = PaymentState::Completed;
                payment.remote_id = result.tran_ref;
                payment.amount = amount;
                let payment = self.payments.update(&payment).await?;
                info!(payment_id = %payment.id, "full capture applied");
                Ok(FollowupOutcome::Applied(payment))
            }
        } else if result.pending_success {
            warn!(
                tran_ref = %payment.remote_id,
                "capture pending at processor: {}", result.message
            );
            Ok(FollowupOutcome::Pending {
                message: result.message,
            })
        } else {
            Err(GatewayError::processor(
                Some(&payment.remote_id),
                result.message,
            ))
        }
    }

    /// Cancel an authorization before capture.
    pub async fn void(&self, payment_id: Uuid) -> GatewayResult<FollowupOutcome> {
        let lock = self.payment_lock(payment_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.void_locked(payment_id).await
        };
        drop(lock);
        self.release_payment_lock(payment_id).await;
        result
    }

    async fn void_locked(&self, payment_id: Uuid) -> GatewayResult<FollowupOutcome> {
        let mut payment = self.load_payment(payment_id).await?;
        Self::assert_state(&payment, &[PaymentState::Authorization])?;

        let amount = payment.amount.clone();
        let request =
            Self::build_request(&payment, TransactionType::Void, &amount, "voided by merchant")?;
        let result = self.processor.request_followup(&request).await.map_err(|e| {
            error!(
                "failed to proceed to void transaction: {}: {}",
                payment.remote_id, e
            );
            e
        })?;

        if result.success {
            payment.state = PaymentState::AuthorizationVoided;
            payment.remote_id = result.tran_ref;
            let payment = self.payments.update(&payment).await?;
            info!(payment_id = %payment.id, "authorization voided");
            Ok(FollowupOutcome::Applied(payment))
        } else if result.pending_success {
            warn!(
                tran_ref = %payment.remote_id,
                "void pending at processor: {}", result.message
            );
            Ok(FollowupOutcome::Pending {
                message: result.message,
            })
        } else {
            Err(GatewayError::processor(
                Some(&payment.remote_id),
                result.message,
            ))
        }
    }
}
