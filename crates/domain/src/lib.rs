//! Domain layer for the order orchestration system.
//!
//! This crate provides:
//! - Aggregate trait for event-sourced process instances
//! - Journal for recording and replaying instance streams
//! - Order, Shipment and Charge aggregates with their events
//! - Shared value objects (items, money, failures)

pub mod aggregate;
pub mod billing;
pub mod error;
pub mod failure;
pub mod journal;
pub mod order;
pub mod shipment;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use billing::{Charge, ChargeEvent, ChargeInput, ChargeOutcome, ChargeResult, Invoice, ItemPrice};
pub use error::{DomainError, ValidationError};
pub use failure::{Failure, FailureKind};
pub use journal::Journal;
pub use order::{
    Allocation, CustomerAction, Fulfillment, FulfillmentStatus, Order, OrderEvent, OrderResult,
    OrderStatus,
};
pub use shipment::{Shipment, ShipmentEvent, ShipmentResult, ShipmentStatus};
pub use value_objects::{CustomerId, Item, Money, Sku, validate_items};
