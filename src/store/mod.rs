//! Persistence boundary
//!
//! Payment and order records live in the host platform's storage; the
//! gateway reaches them through these traits. `upsert_reconciliation` is the
//! load-bearing operation: implementations must make it atomic per
//! `(order_id, remote_id, remote_state)` so concurrent deliveries of the
//! same callback collapse into a single record.

pub mod memory;
pub mod postgres;

use crate::order::Order;
use crate::payment::Payment;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::{init_pool, PgOrderStore, PgPaymentStore};

/// Errors surfaced by the storage backends
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    /// Unique constraint violation (e.g. duplicate reconciliation triple)
    #[error("conflicting write: {message}")]
    Conflict { message: String },
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// Payment record storage
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<Payment>, StoreError>;

    /// Look up the payment matching a reconciliation triple.
    async fn find_reconciliation(
        &self,
        order_id: &str,
        remote_id: &str,
        remote_state: &str,
    ) -> Result<Option<Payment>, StoreError>;

    /// Insert `candidate` unless a payment with the same
    /// `(order_id, remote_id, remote_state)` already exists, in which case
    /// only the existing record's `state` is updated to the candidate's.
    /// Atomic with respect to concurrent calls for the same triple.
    async fn upsert_reconciliation(&self, candidate: Payment) -> Result<Payment, StoreError>;

    async fn insert(&self, payment: &Payment) -> Result<Payment, StoreError>;

    async fn update(&self, payment: &Payment) -> Result<Payment, StoreError>;
}

/// Order snapshot storage (read-mostly; owned by the host platform)
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, StoreError>;

    /// Advance the order's workflow status string.
    async fn set_status(&self, id: &str, status: &str) -> Result<(), StoreError>;
}
