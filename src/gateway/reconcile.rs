//! Reconciliation engine
//!
//! Idempotent upsert of payment records driven by validated callback data.
//! Both callback entry points terminate here, as does nothing else: this is
//! the only place a callback-driven payment write happens.

use crate::error::GatewayResult;
use crate::money::Price;
use crate::order::Order;
use crate::payment::{Payment, PaymentState};
use crate::processor::types::ResponseStatus;
use crate::store::PaymentStore;
use std::sync::Arc;
use tracing::info;

pub struct ReconciliationEngine {
    payments: Arc<dyn PaymentStore>,
}

impl ReconciliationEngine {
    pub fn new(payments: Arc<dyn PaymentStore>) -> Self {
        Self { payments }
    }

    /// Record a processor outcome against an order.
    ///
    /// Creates a payment for the order's total when the
    /// `(order, transaction reference, response status)` triple is new;
    /// re-delivery of an already-recorded outcome only refreshes the state.
    /// The store guarantees the find-or-create is atomic per triple.
    pub async fn reconcile(
        &self,
        order: &Order,
        tran_ref: &str,
        resp_status: &ResponseStatus,
        mapped_state: PaymentState,
        amount: Price,
    ) -> GatewayResult<Payment> {
        let candidate = Payment::new(
            &order.id,
            mapped_state,
            amount,
            tran_ref,
            resp_status.code(),
        );

        info!(
            order_id = %order.id,
            %tran_ref,
            "Saving payment information. Transaction reference: {}",
            tran_ref
        );
        let payment = self.payments.upsert_reconciliation(candidate).await?;
        info!(
            payment_id = %payment.id,
            "Payment information saved successfully. Transaction reference: {}",
            tran_ref
        );

        Ok(payment)
    }
}
