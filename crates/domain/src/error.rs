//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Bad caller input. Always reported synchronously and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("{0} is required")]
    Required(&'static str),

    /// A process that needs items was given none.
    #[error("{0} must have items")]
    NoItems(&'static str),

    /// An item line with a zero quantity.
    #[error("invalid quantity {quantity} for sku {sku} (must be greater than 0)")]
    InvalidQuantity { sku: String, quantity: u32 },

    /// A shipment status name that is not booked, dispatched or delivered.
    #[error("unknown shipment status: {0}")]
    UnknownStatus(String),

    /// A customer action that is not amend or cancel.
    #[error("unknown customer action: {0}")]
    UnknownAction(String),

    /// An allocation that does not partition the ordered items.
    #[error("allocation does not cover the order: {0}")]
    InvalidAllocation(String),
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The command input was invalid.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A start command targeted an instance that already has a stream.
    #[error("{aggregate_type} {id} already started")]
    AlreadyStarted {
        aggregate_type: &'static str,
        id: String,
    },

    /// The instance has no stream.
    #[error("{aggregate_type} {id} not found")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
