//! Transaction request builder
//!
//! Pure construction of the outbound pay-page descriptor from an order
//! snapshot and the gateway configuration. All required-field validation
//! happens here, before any network call is attempted.

use crate::config::{GatewayConfig, PayPageMode};
use crate::error::{GatewayError, GatewayResult};
use crate::order::Order;
use crate::processor::types::{
    CustomerDetails, PluginInfo, ShippingDetails, TransactionClass, TransactionDescriptor,
    TransactionType,
};
use rust_decimal::prelude::ToPrimitive;

/// Placeholder sent when the billing profile has no phone number.
/// Not a production-safe default; the processor requires the field.
const PHONE_PLACEHOLDER: &str = "00000000000";

/// Placeholder sent when the billing profile has no postal code.
const POSTAL_CODE_PLACEHOLDER: &str = "00000";

/// Build a pay-page descriptor for an order.
///
/// Fails with `Validation` when the billing name, address line, or email is
/// missing; those fields are mandatory on the processor side and failing
/// early avoids a doomed outbound call.
pub fn build_descriptor(
    order: &Order,
    config: &GatewayConfig,
    gateway_id: &str,
    return_url: &str,
    locale: &str,
) -> GatewayResult<TransactionDescriptor> {
    let billing = &order.billing;

    let name = format!("{} {}", billing.given_name, billing.family_name)
        .trim()
        .to_string();
    if name.is_empty() {
        return Err(GatewayError::Validation(
            "billing name is required".to_string(),
        ));
    }

    let email = billing
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| GatewayError::Validation("billing email is required".to_string()))?;

    let street1 = billing
        .address_line
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| GatewayError::Validation("billing address line is required".to_string()))?;

    let rounded = order.total_price.rounded();
    let cart_amount = rounded
        .amount()
        .to_f64()
        .ok_or_else(|| GatewayError::Validation("order total is not representable".to_string()))?;

    let city = billing.locality.clone().unwrap_or_default();

    let tran_type = match config.pay_page_mode {
        PayPageMode::Sale => TransactionType::Sale,
        PayPageMode::Auth => TransactionType::Auth,
    };

    let callback = format!(
        "{}/payment/notify/{}",
        config.callback_base_url.trim_end_matches('/'),
        gateway_id
    );

    Ok(TransactionDescriptor {
        payment_methods: vec!["all".to_string()],
        tran_type,
        tran_class: TransactionClass::Ecom,
        cart_id: order.id.clone(),
        cart_currency: rounded.currency().to_string(),
        cart_amount,
        cart_description: format!("Order Number: {}", order.id),
        paypage_lang: locale.to_string(),
        customer_details: CustomerDetails {
            name,
            email: email.to_string(),
            phone: billing
                .phone
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| PHONE_PLACEHOLDER.to_string()),
            street1: street1.to_string(),
            city: city.clone(),
            state: normalize_administrative_area(billing.administrative_area.as_deref(), &city),
            country: billing.country.clone(),
            zip: billing
                .postal_code
                .clone()
                .filter(|z| !z.is_empty())
                .unwrap_or_else(|| POSTAL_CODE_PLACEHOLDER.to_string()),
            ip: None,
        },
        shipping_details: order.shipping.as_ref().map(|shipping| {
            let shipping_city = shipping.locality.clone().unwrap_or_default();
            ShippingDetails {
                name: format!("{} {}", shipping.given_name, shipping.family_name)
                    .trim()
                    .to_string(),
                street1: shipping.address_line.clone().unwrap_or_default(),
                city: shipping_city.clone(),
                state: normalize_administrative_area(
                    shipping.administrative_area.as_deref(),
                    &shipping_city,
                ),
                country: shipping.country.clone(),
                zip: shipping
                    .postal_code
                    .clone()
                    .filter(|z| !z.is_empty())
                    .unwrap_or_else(|| POSTAL_CODE_PLACEHOLDER.to_string()),
            }
        }),
        hide_shipping: config.hide_shipping_address,
        return_url: return_url.to_string(),
        callback,
        framed: false,
        plugin_info: PluginInfo::current(),
    })
}

/// Strip the " Governorate" suffix some address providers append to the
/// administrative area, falling back to the locality when the area is
/// absent. Locale-specific quirk carried over from the processor's
/// requirements, not a general rule.
fn normalize_administrative_area(area: Option<&str>, locality: &str) -> String {
    match area.filter(|a| !a.is_empty()) {
        Some(area) => area.replace(" Governorate", ""),
        None => locality.to_string(),
    }
}
