//! Processor integration
//!
//! The gateway talks to the payment processor through the `ProcessorClient`
//! trait so the reconciliation and follow-up logic can be exercised against
//! a scripted client in tests. `ClickpayHttpClient` is the production
//! implementation.

pub mod client;
pub mod types;

pub use client::{ClickpayHttpClient, ProcessorClient};
