//! In-memory store
//!
//! Backs tests and local development. A single mutex over the payment map
//! serializes the reconciliation upsert, which is exactly the per-triple
//! atomicity `PaymentStore` requires.

use crate::order::Order;
use crate::payment::Payment;
use crate::store::{OrderStore, PaymentStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    payments: Mutex<HashMap<Uuid, Payment>>,
    orders: Mutex<HashMap<String, Order>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_order(&self, order: Order) {
        self.orders.lock().await.insert(order.id.clone(), order);
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.lock().await.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<Payment>, StoreError> {
        let payments = self.payments.lock().await;
        let mut matching: Vec<Payment> = payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.authorized_at);
        Ok(matching)
    }

    async fn find_reconciliation(
        &self,
        order_id: &str,
        remote_id: &str,
        remote_state: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let payments = self.payments.lock().await;
        Ok(payments
            .values()
            .find(|p| {
                p.order_id == order_id && p.remote_id == remote_id && p.remote_state == remote_state
            })
            .cloned())
    }

    async fn upsert_reconciliation(&self, candidate: Payment) -> Result<Payment, StoreError> {
        // Find-or-create happens under one lock so racing deliveries of the
        // same callback cannot both insert.
        let mut payments = self.payments.lock().await;
        let existing = payments
            .values_mut()
            .find(|p| {
                p.order_id == candidate.order_id
                    && p.remote_id == candidate.remote_id
                    && p.remote_state == candidate.remote_state
            });

        match existing {
            Some(payment) => {
                payment.state = candidate.state;
                Ok(payment.clone())
            }
            None => {
                payments.insert(candidate.id, candidate.clone());
                Ok(candidate)
            }
        }
    }

    async fn insert(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let mut payments = self.payments.lock().await;
        if payments.contains_key(&payment.id) {
            return Err(StoreError::Conflict {
                message: format!("payment {} already exists", payment.id),
            });
        }
        payments.insert(payment.id, payment.clone());
        Ok(payment.clone())
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let mut payments = self.payments.lock().await;
        if !payments.contains_key(&payment.id) {
            return Err(StoreError::not_found("Payment", payment.id.to_string()));
        }
        payments.insert(payment.id, payment.clone());
        Ok(payment.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().await.get(id).cloned())
    }

    async fn set_status(&self, id: &str, status: &str) -> Result<(), StoreError> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order.status = status.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Price;
    use crate::payment::PaymentState;
    use rust_decimal_macros::dec;

    fn payment(order_id: &str, remote_id: &str, remote_state: &str) -> Payment {
        Payment::new(
            order_id,
            PaymentState::Completed,
            Price::new(dec!(150.000), "KWD"),
            remote_id,
            remote_state,
        )
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_in_place() {
        let store = InMemoryStore::new();

        let first = store
            .upsert_reconciliation(payment("1042", "TST2024001", "A"))
            .await
            .unwrap();

        let mut second = payment("1042", "TST2024001", "A");
        second.state = PaymentState::Authorization;
        let updated = store.upsert_reconciliation(second).await.unwrap();

        assert_eq!(updated.id, first.id);
        assert_eq!(updated.state, PaymentState::Authorization);
        assert_eq!(store.find_by_order("1042").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_distinct_triples_create_distinct_records() {
        let store = InMemoryStore::new();
        store
            .upsert_reconciliation(payment("1042", "TST2024001", "A"))
            .await
            .unwrap();
        store
            .upsert_reconciliation(payment("1042", "TST2024002", "A"))
            .await
            .unwrap();
        assert_eq!(store.find_by_order("1042").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = InMemoryStore::new();
        let ghost = payment("1042", "TST2024001", "A");
        assert!(matches!(
            store.update(&ghost).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
