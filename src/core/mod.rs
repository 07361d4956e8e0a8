//! Cross-cutting building blocks: errors, pricing, auth and metrics.

pub mod auth;
pub mod error;
pub mod metrics;
pub mod pricing;
