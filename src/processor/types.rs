//! Processor wire types
//!
//! Typed request and response payloads exchanged with the Clickpay API, plus
//! the raw callback field set delivered to the return and notification
//! endpoints. Parsing happens here at the boundary; the rest of the gateway
//! only sees typed values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Processor transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Auth,
    Capture,
    Refund,
    Void,
}

impl TransactionType {
    /// Parse the processor's `tran_type` field. The API is inconsistent
    /// about casing between requests and query responses.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sale" => Some(TransactionType::Sale),
            "auth" => Some(TransactionType::Auth),
            "capture" => Some(TransactionType::Capture),
            "refund" => Some(TransactionType::Refund),
            "void" => Some(TransactionType::Void),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Auth => "auth",
            TransactionType::Capture => "capture",
            TransactionType::Refund => "refund",
            TransactionType::Void => "void",
        }
    }
}

/// Processor transaction class; only e-commerce is used by this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionClass {
    Ecom,
}

/// Processor response status code: `A` approved, `C` cancelled, anything
/// else is a processor-specific code carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Approved,
    Cancelled,
    Other(String),
}

impl ResponseStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "A" => ResponseStatus::Approved,
            "C" => ResponseStatus::Cancelled,
            other => ResponseStatus::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ResponseStatus::Approved => "A",
            ResponseStatus::Cancelled => "C",
            ResponseStatus::Other(code) => code,
        }
    }
}

/// Customer contact and address block of a pay-page request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street1: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Shipping address block of a pay-page request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: String,
    pub street1: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: String,
}

/// Platform metadata reported to the processor with every pay-page request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub cms_name: String,
    pub cms_version: String,
    pub plugin_version: String,
}

impl PluginInfo {
    pub fn current() -> Self {
        Self {
            cms_name: "commerce".to_string(),
            cms_version: "2.x".to_string(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Outbound create-pay-page payload.
///
/// Ephemeral: built per request, never persisted. Credentials are attached
/// by the processor client, not carried here.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDescriptor {
    pub payment_methods: Vec<String>,
    pub tran_type: TransactionType,
    pub tran_class: TransactionClass,
    pub cart_id: String,
    pub cart_currency: String,
    pub cart_amount: f64,
    pub cart_description: String,
    pub paypage_lang: String,
    pub customer_details: CustomerDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_details: Option<ShippingDetails>,
    pub hide_shipping: bool,
    #[serde(rename = "return")]
    pub return_url: String,
    pub callback: String,
    pub framed: bool,
    pub plugin_info: PluginInfo,
}

/// Outbound capture/refund/void payload targeting an existing transaction
#[derive(Debug, Clone, Serialize)]
pub struct FollowupRequest {
    pub tran_type: TransactionType,
    pub tran_class: TransactionClass,
    pub cart_id: String,
    pub cart_currency: String,
    pub cart_amount: f64,
    pub cart_description: String,
    /// Transaction reference being followed up
    pub tran_ref: String,
}

/// Successful create-pay-page response
#[derive(Debug, Clone)]
pub struct PayPageResponse {
    pub tran_ref: String,
    pub redirect_url: String,
}

/// Authoritative transaction data re-queried from the processor.
///
/// `tran_type` is `None` when the processor reports a type this gateway does
/// not recognize; the status mapper treats that as an explicit no-op.
#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub tran_ref: String,
    pub tran_type: Option<TransactionType>,
}

/// Follow-up (capture/refund/void) response
#[derive(Debug, Clone)]
pub struct FollowupResponse {
    pub success: bool,
    pub pending_success: bool,
    pub message: String,
    pub tran_ref: String,
    pub cart_id: String,
    pub response_status: String,
}

/// Raw inbound callback field set.
///
/// Fields are kept sorted by name because the signature scheme is defined
/// over the lexicographically ordered non-empty fields.
#[derive(Debug, Clone, Default)]
pub struct CallbackFields(BTreeMap<String, String>);

impl CallbackFields {
    pub fn new(fields: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(fields.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn tran_ref(&self) -> Option<&str> {
        self.get("tranRef")
    }

    pub fn resp_status(&self) -> Option<&str> {
        self.get("respStatus")
    }

    pub fn cart_id(&self) -> Option<&str> {
        self.get("cartId")
    }

    pub fn cart_amount(&self) -> Option<&str> {
        self.get("cart_amount")
    }

    pub fn resp_message(&self) -> &str {
        self.get("respMessage").unwrap_or("")
    }

    pub fn signature(&self) -> Option<&str> {
        self.get("signature")
    }

    /// Non-empty fields other than the signature itself, in key order.
    /// This is the exact field set the signature is computed over.
    pub fn signable_fields(&self) -> Vec<(&str, &str)> {
        self.0
            .iter()
            .filter(|(key, value)| key.as_str() != "signature" && !value.is_empty())
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }
}

impl From<std::collections::HashMap<String, String>> for CallbackFields {
    fn from(fields: std::collections::HashMap<String, String>) -> Self {
        Self(fields.into_iter().collect())
    }
}
