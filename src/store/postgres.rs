//! PostgreSQL store
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE payments (
//!     id UUID PRIMARY KEY,
//!     order_id TEXT NOT NULL,
//!     state TEXT NOT NULL,
//!     amount NUMERIC NOT NULL,
//!     currency TEXT NOT NULL,
//!     refunded_amount NUMERIC NOT NULL DEFAULT 0,
//!     remote_id TEXT NOT NULL,
//!     remote_state TEXT NOT NULL,
//!     authorized_at TIMESTAMPTZ NOT NULL,
//!     UNIQUE (order_id, remote_id, remote_state)
//! );
//!
//! CREATE TABLE order_snapshots (
//!     id TEXT PRIMARY KEY,
//!     payload JSONB NOT NULL
//! );
//! ```
//!
//! The UNIQUE constraint on `(order_id, remote_id, remote_state)` plus the
//! `ON CONFLICT` upsert gives the reconciliation engine its per-triple
//! atomicity without any application-side locking.

use crate::order::Order;
use crate::payment::{Payment, PaymentState};
use crate::store::{OrderStore, PaymentStore, StoreError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{error as log_error, info};
use uuid::Uuid;

use crate::money::Price;

const PAYMENT_COLUMNS: &str =
    "id, order_id, state, amount, currency, refunded_amount, remote_id, remote_state, authorized_at";

/// Initialize the database connection pool
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    info!(
        "Initializing database pool: max_connections={}",
        max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            from_sqlx(e)
        })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

fn from_sqlx(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::RowNotFound => StoreError::not_found("Record", "unknown"),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            StoreError::Conflict {
                message: db_err.message().to_string(),
            }
        }
        _ => StoreError::backend(error.to_string()),
    }
}

fn payment_from_row(row: &PgRow) -> Result<Payment, StoreError> {
    let read = |e: sqlx::Error| StoreError::backend(format!("malformed payment row: {e}"));

    let currency: String = row.try_get("currency").map_err(read)?;
    let amount: Decimal = row.try_get("amount").map_err(read)?;
    let refunded: Decimal = row.try_get("refunded_amount").map_err(read)?;
    let state: String = row.try_get("state").map_err(read)?;

    Ok(Payment {
        id: row.try_get("id").map_err(read)?,
        order_id: row.try_get("order_id").map_err(read)?,
        state: PaymentState::from(state),
        amount: Price::new(amount, &currency),
        refunded_amount: Price::new(refunded, &currency),
        remote_id: row.try_get("remote_id").map_err(read)?,
        remote_state: row.try_get("remote_state").map_err(read)?,
        authorized_at: row.try_get("authorized_at").map_err(read)?,
    })
}

/// Payment repository backed by PostgreSQL
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY authorized_at"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;

        rows.iter().map(payment_from_row).collect()
    }

    async fn find_reconciliation(
        &self,
        order_id: &str,
        remote_id: &str,
        remote_state: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE order_id = $1 AND remote_id = $2 AND remote_state = $3"
        ))
        .bind(order_id)
        .bind(remote_id)
        .bind(remote_state)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn upsert_reconciliation(&self, candidate: Payment) -> Result<Payment, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (order_id, remote_id, remote_state)
             DO UPDATE SET state = EXCLUDED.state
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(candidate.id)
        .bind(&candidate.order_id)
        .bind(candidate.state.as_str())
        .bind(candidate.amount.amount())
        .bind(candidate.amount.currency())
        .bind(candidate.refunded_amount.amount())
        .bind(&candidate.remote_id)
        .bind(&candidate.remote_state)
        .bind(candidate.authorized_at)
        .fetch_one(&self.pool)
        .await
        .map_err(from_sqlx)?;

        payment_from_row(&row)
    }

    async fn insert(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(&payment.order_id)
        .bind(payment.state.as_str())
        .bind(payment.amount.amount())
        .bind(payment.amount.currency())
        .bind(payment.refunded_amount.amount())
        .bind(&payment.remote_id)
        .bind(&payment.remote_state)
        .bind(payment.authorized_at)
        .fetch_one(&self.pool)
        .await
        .map_err(from_sqlx)?;

        payment_from_row(&row)
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE payments
             SET state = $2, amount = $3, currency = $4, refunded_amount = $5,
                 remote_id = $6, remote_state = $7
             WHERE id = $1
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(payment.state.as_str())
        .bind(payment.amount.amount())
        .bind(payment.amount.currency())
        .bind(payment.refunded_amount.amount())
        .bind(&payment.remote_id)
        .bind(&payment.remote_state)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;

        match row {
            Some(row) => payment_from_row(&row),
            None => Err(StoreError::not_found("Payment", payment.id.to_string())),
        }
    }
}

/// Order snapshot repository backed by PostgreSQL.
/// Snapshots arrive from the host platform as JSON documents.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT payload FROM order_snapshots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx)?;

        match row {
            Some(row) => {
                let payload: serde_json::Value = row
                    .try_get("payload")
                    .map_err(|e| StoreError::backend(format!("malformed order row: {e}")))?;
                let order = serde_json::from_value(payload)
                    .map_err(|e| StoreError::backend(format!("malformed order snapshot: {e}")))?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn set_status(&self, id: &str, status: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE order_snapshots
             SET payload = jsonb_set(payload, '{status}', to_jsonb($2::text))
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Order", id));
        }
        Ok(())
    }
}
