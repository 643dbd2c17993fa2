//! Order snapshots
//!
//! Orders are owned by the host commerce platform; the gateway reads them to
//! build pay-page requests and only ever writes back the workflow status
//! after a successful synchronous return.

use crate::money::Price;
use serde::{Deserialize, Serialize};

/// Billing contact attached to an order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingProfile {
    pub given_name: String,
    pub family_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-3 country code
    pub country: String,
}

/// Shipping destination attached to an order, when one exists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingProfile {
    pub given_name: String,
    pub family_name: String,
    pub address_line: Option<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: Price,
}

/// Price adjustment (promotion, shipping charge, tax, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub label: String,
    pub amount: Price,
}

/// Read-only order snapshot from the host platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub total_price: Price,
    pub billing: BillingProfile,
    pub shipping: Option<ShippingProfile>,
    pub items: Vec<OrderItem>,
    pub adjustments: Vec<Adjustment>,
    /// Host platform workflow status string
    pub status: String,
}
