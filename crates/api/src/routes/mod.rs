//! HTTP route handlers.

pub mod charge;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod shipments;
