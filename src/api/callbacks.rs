//! Callback endpoints
//!
//! Receives the processor's form-encoded return and notification posts.
//! Signature failures are answered with 403 and a generic message; the
//! reason is logged, never echoed back to the caller.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info};

use crate::api::AppState;
use crate::error::GatewayError;
use crate::processor::types::CallbackFields;
use crate::store::StoreError;

/// Synchronous browser return for an order's payment session.
pub async fn payment_return(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let fields = CallbackFields::from(fields);
    match state.gateway.handle_return(&order_id, &fields).await {
        Ok(Some(payment)) => {
            info!(order_id = %order_id, payment_id = %payment.id, "return processed");
            Ok(Json(json!({
                "payment_id": payment.id,
                "state": payment.state.as_str(),
            })))
        }
        Ok(None) => Ok(Json(json!({}))),
        Err(err) => Err(reject(err)),
    }
}

/// Asynchronous server-to-server notification. Keyed by gateway id so the
/// processor-side configuration can address a specific gateway instance.
pub async fn payment_notify(
    State(state): State<AppState>,
    Path(gateway_id): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let fields = CallbackFields::from(fields);
    match state.gateway.handle_notify(&fields).await {
        Ok(_) => {
            info!(%gateway_id, "notification processed");
            // The processor only cares that the notification was accepted.
            Ok(Json(json!({})))
        }
        Err(err) => Err(reject(err)),
    }
}

fn reject(err: GatewayError) -> (StatusCode, Json<Value>) {
    match &err {
        GatewayError::InvalidCallback(reason) => {
            error!("callback rejected: {}", reason);
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "callback rejected" })),
            )
        }
        GatewayError::Validation(message) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": message })),
        ),
        GatewayError::Store(StoreError::NotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        ),
        _ => {
            error!("callback processing failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "processing failed" })),
            )
        }
    }
}
