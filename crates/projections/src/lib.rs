//! Query side of order fulfillment.
//!
//! - [`OrderStatusView`] answers order status queries from the live
//!   processes, asking each shipment process for its own status
//! - [`ShipmentListView`] is a [`Projection`] over the event log listing
//!   shipments that are still in progress
//! - [`ProjectionProcessor`] feeds the log to projections

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    FulfillmentReport, OrderStatusReport, OrderStatusView, ShipmentListView, ShipmentPage,
    ShipmentReport, ShipmentSummary,
};
