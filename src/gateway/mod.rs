//! Offsite payment gateway
//!
//! Ties the pipeline together: descriptor building for the redirect leg,
//! then validate, verify, map, reconcile for both callback legs. The two
//! callback entry points differ only in how they locate the order; all
//! processing below that is shared.

pub mod builder;
pub mod callback;
pub mod followup;
pub mod reconcile;
pub mod status;

pub use builder::build_descriptor;
pub use callback::{AcceptedCallback, CallbackValidator};
pub use followup::{FollowupOrchestrator, FollowupOutcome};
pub use reconcile::ReconciliationEngine;
pub use status::map_status;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::order::Order;
use crate::payment::{Payment, PaymentState};
use crate::processor::types::{CallbackFields, PayPageResponse, ResponseStatus};
use crate::processor::ProcessorClient;
use crate::store::{OrderStore, PaymentStore, StoreError};
use std::sync::Arc;
use tracing::info;

pub struct OffsiteGateway {
    config: GatewayConfig,
    processor: Arc<dyn ProcessorClient>,
    validator: CallbackValidator,
    engine: ReconciliationEngine,
    orders: Arc<dyn OrderStore>,
}

impl OffsiteGateway {
    pub fn new(
        config: GatewayConfig,
        processor: Arc<dyn ProcessorClient>,
        payments: Arc<dyn PaymentStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            config,
            validator: CallbackValidator::new(processor.clone()),
            engine: ReconciliationEngine::new(payments),
            processor,
            orders,
        }
    }

    /// Start a hosted-page payment session for an order. Returns the URL the
    /// shopper must be redirected to.
    pub async fn create_payment_session(
        &self,
        order: &Order,
        gateway_id: &str,
        return_url: &str,
        locale: &str,
    ) -> GatewayResult<PayPageResponse> {
        let descriptor = build_descriptor(order, &self.config, gateway_id, return_url, locale)?;
        let response = self.processor.create_pay_page(&descriptor).await?;
        info!(
            order_id = %order.id,
            tran_ref = %response.tran_ref,
            "pay page created"
        );
        Ok(response)
    }

    /// Synchronous browser return. The order is named by the route, so the
    /// callback's cart id must match it.
    pub async fn handle_return(
        &self,
        order_id: &str,
        fields: &CallbackFields,
    ) -> GatewayResult<Option<Payment>> {
        let accepted = self.validator.validate(fields)?;
        if accepted.cart_id != order_id {
            return Err(GatewayError::InvalidCallback(format!(
                "cart id '{}' does not match order '{}'",
                accepted.cart_id, order_id
            )));
        }
        let order = self.load_order(order_id).await?;
        let payment = self.process(&order, &accepted).await?;

        // Only the synchronous return advances the order; the asynchronous
        // notification records the payment and leaves workflow to the return.
        // A hold counts as a successful return, the same as a settlement.
        if let Some(payment) = &payment {
            if matches!(
                payment.state,
                PaymentState::Completed | PaymentState::Authorization
            ) {
                self.orders
                    .set_status(&order.id, &self.config.complete_order_status)
                    .await?;
                info!(
                    order_id = %order.id,
                    status = %self.config.complete_order_status,
                    "order advanced after approved payment"
                );
            }
        }
        Ok(payment)
    }

    /// Asynchronous server-to-server notification. The order is located by
    /// the callback's cart id.
    pub async fn handle_notify(&self, fields: &CallbackFields) -> GatewayResult<Option<Payment>> {
        let accepted = self.validator.validate(fields)?;
        let order = self.load_order(&accepted.cart_id).await?;
        self.process(&order, &accepted).await
    }

    async fn load_order(&self, order_id: &str) -> GatewayResult<Order> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| GatewayError::Store(StoreError::not_found("Order", order_id)))
    }

    /// Shared tail of both callback legs: verify, map, reconcile, and
    /// advance the order when the payment completed.
    async fn process(
        &self,
        order: &Order,
        accepted: &AcceptedCallback,
    ) -> GatewayResult<Option<Payment>> {
        // The callback's own type claim is never trusted; approved outcomes
        // are re-queried from the processor before any state is assigned.
        let tran_type = match accepted.resp_status {
            ResponseStatus::Approved => {
                self.processor
                    .verify_payment(&accepted.tran_ref)
                    .await?
                    .tran_type
            }
            _ => None,
        };

        let Some(state) = map_status(&accepted.resp_status, tran_type, &accepted.resp_message)
        else {
            return Ok(None);
        };

        let payment = self
            .engine
            .reconcile(
                order,
                &accepted.tran_ref,
                &accepted.resp_status,
                state,
                order.total_price.clone(),
            )
            .await?;

        Ok(Some(payment))
    }
}
