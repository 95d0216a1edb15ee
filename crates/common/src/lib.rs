//! Shared types for the order orchestration system.

mod types;

pub use types::AggregateId;
