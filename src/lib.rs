//! Clickpay hosted-page payment gateway.
//!
//! Integrates a commerce platform with the Clickpay processor: builds
//! pay-page sessions, validates signed callbacks, reconciles processor
//! outcomes into payment records, and drives capture/refund/void follow-ups.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod money;
pub mod order;
pub mod payment;
pub mod processor;
pub mod store;

pub use config::{Config, GatewayConfig, PayPageMode, Region};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{FollowupOrchestrator, FollowupOutcome, OffsiteGateway};
pub use money::Price;
pub use order::Order;
pub use payment::{Payment, PaymentState};
pub use processor::{ClickpayHttpClient, ProcessorClient};
