//! Clickpay API client
//!
//! Implements page creation, redirect-signature validation, payment
//! verification, and follow-up requests against the processor's HTTP API.
//! Requests are bounded by the configured timeout and are never retried
//! here; retry policy belongs to the caller.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::processor::types::{
    CallbackFields, FollowupRequest, FollowupResponse, PayPageResponse, TransactionDescriptor,
    TransactionType, VerifiedTransaction,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, error, info};

type HmacSha256 = Hmac<Sha256>;

/// Processor operations consumed by the gateway core
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// Request a hosted payment page for the given transaction descriptor.
    async fn create_pay_page(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> GatewayResult<PayPageResponse>;

    /// Check that an inbound callback field set was signed by the processor.
    /// This gate is mandatory before any payment record is read or written.
    fn is_valid_redirect(&self, fields: &CallbackFields) -> bool;

    /// Re-query a transaction directly from the processor. The callback's
    /// self-reported transaction type is never trusted on its own.
    async fn verify_payment(&self, tran_ref: &str) -> GatewayResult<VerifiedTransaction>;

    /// Issue a capture, refund, or void against an existing transaction.
    async fn request_followup(&self, request: &FollowupRequest)
        -> GatewayResult<FollowupResponse>;
}

/// HTTP implementation of `ProcessorClient`
pub struct ClickpayHttpClient {
    profile_id: u64,
    server_key: String,
    base_url: String,
    client: Client,
}

impl ClickpayHttpClient {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                GatewayError::processor(None, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            profile_id: config.profile_id,
            server_key: config.server_key.clone(),
            base_url: config.region.base_url().to_string(),
            client,
        })
    }

    /// Make an authenticated request to the processor API.
    async fn post_json<T>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        reference: Option<&str>,
    ) -> GatewayResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint, "sending processor request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.server_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request to {endpoint} timed out")
                } else {
                    format!("request to {endpoint} failed: {e}")
                };
                error!("processor request error: {}", message);
                GatewayError::processor(reference, message)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("failed to read processor response body: {}", e);
            GatewayError::processor(reference, format!("failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            error!("processor returned HTTP {}: {}", status, text);
            return Err(GatewayError::processor(
                reference,
                format!("HTTP {status}: {text}"),
            ));
        }

        serde_json::from_str::<T>(&text).map_err(|e| {
            error!("failed to parse processor response: {}", e);
            GatewayError::processor(reference, format!("invalid response format: {e}"))
        })
    }

    /// Merge the merchant profile id into an outgoing payload.
    fn with_profile<S: Serialize>(&self, payload: &S) -> GatewayResult<serde_json::Value> {
        let mut value = serde_json::to_value(payload)
            .map_err(|e| GatewayError::processor(None, format!("unserializable payload: {e}")))?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "profile_id".to_string(),
                serde_json::Value::from(self.profile_id),
            );
        }
        Ok(value)
    }
}

#[async_trait]
impl ProcessorClient for ClickpayHttpClient {
    async fn create_pay_page(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> GatewayResult<PayPageResponse> {
        info!(
            cart_id = %descriptor.cart_id,
            amount = descriptor.cart_amount,
            currency = %descriptor.cart_currency,
            "requesting payment page"
        );

        let body = self.with_profile(descriptor)?;
        let wire: PayPageWire = self.post_json("/payment/request", &body, None).await?;

        match (wire.redirect_url, wire.tran_ref) {
            (Some(redirect_url), Some(tran_ref)) if !redirect_url.is_empty() => {
                info!(%tran_ref, "payment page created");
                Ok(PayPageResponse {
                    tran_ref,
                    redirect_url,
                })
            }
            _ => {
                let message = wire
                    .message
                    .unwrap_or_else(|| "no redirect URL in response".to_string());
                error!("failed to create payment page: {}", message);
                Err(GatewayError::processor(None, message))
            }
        }
    }

    fn is_valid_redirect(&self, fields: &CallbackFields) -> bool {
        let Some(provided) = fields.signature() else {
            return false;
        };
        let computed = match compute_signature(fields, &self.server_key) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        constant_time_eq(computed.as_bytes(), provided.trim().as_bytes())
    }

    async fn verify_payment(&self, tran_ref: &str) -> GatewayResult<VerifiedTransaction> {
        info!(%tran_ref, "verifying payment with processor");

        let body = self.with_profile(&serde_json::json!({ "tran_ref": tran_ref }))?;
        let wire: QueryWire = self
            .post_json("/payment/query", &body, Some(tran_ref))
            .await?;

        let tran_type = wire
            .tran_type
            .as_deref()
            .and_then(TransactionType::from_wire);
        Ok(VerifiedTransaction {
            tran_ref: wire.tran_ref,
            tran_type,
        })
    }

    async fn request_followup(
        &self,
        request: &FollowupRequest,
    ) -> GatewayResult<FollowupResponse> {
        info!(
            tran_ref = %request.tran_ref,
            tran_type = request.tran_type.as_str(),
            amount = request.cart_amount,
            "requesting follow-up transaction"
        );

        let body = self.with_profile(request)?;
        let wire: FollowupWire = self
            .post_json("/payment/request", &body, Some(&request.tran_ref))
            .await?;

        let result = wire.payment_result.ok_or_else(|| {
            GatewayError::processor(
                Some(&request.tran_ref),
                wire.message
                    .clone()
                    .unwrap_or_else(|| "no payment result in response".to_string()),
            )
        })?;

        Ok(FollowupResponse {
            success: result.response_status == "A",
            pending_success: result.response_status == "P",
            message: result.response_message.unwrap_or_default(),
            tran_ref: wire.tran_ref.unwrap_or_default(),
            cart_id: wire.cart_id.unwrap_or_default(),
            response_status: result.response_status,
        })
    }
}

/// Signature over the sorted non-empty callback fields, URL-encoded as a
/// query string and keyed with the merchant server key.
pub(crate) fn compute_signature(
    fields: &CallbackFields,
    server_key: &str,
) -> Result<String, serde_urlencoded::ser::Error> {
    let query = serde_urlencoded::to_string(fields.signable_fields())?;
    let mut mac = HmacSha256::new_from_slice(server_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[derive(Debug, Deserialize)]
struct PayPageWire {
    #[serde(default)]
    tran_ref: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryWire {
    tran_ref: String,
    #[serde(default)]
    tran_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResultWire {
    response_status: String,
    #[serde(default)]
    response_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowupWire {
    #[serde(default)]
    tran_ref: Option<String>,
    #[serde(default)]
    cart_id: Option<String>,
    #[serde(default)]
    payment_result: Option<PaymentResultWire>,
    #[serde(default)]
    message: Option<String>,
}
