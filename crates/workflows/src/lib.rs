//! Durable processes for order fulfillment.
//!
//! Every order, shipment and billing run is an event-sourced process hosted
//! by a tokio task. Progress is recorded before the next step, so a
//! restarted [`Engine`] replays each stream and resumes without repeating
//! side effects that already completed.
//!
//! An order:
//! 1. Allocates its items to warehouses, one fulfillment per location
//! 2. Waits for the customer to amend or cancel
//! 3. On amend, launches a shipment and a billing run per fulfillment
//! 4. Finishes once every child has reported back

pub mod activity;
pub mod billing;
pub mod engine;
pub mod error;
pub mod order;
pub mod process;
pub mod registry;
pub mod services;
pub mod shipment;

pub use activity::ActivityOptions;
pub use billing::{BillingContext, BillingMessage, BillingProcess};
pub use engine::{Engine, Services};
pub use error::{ErrorKind, Result, WorkflowError};
pub use order::{FulfillmentLauncher, LaunchRequest, OrderContext, OrderMessage, OrderProcess};
pub use process::{Outcome, Process, ProcessHandle, Step, StepContext};
pub use registry::Registry;
pub use services::{
    Allocator, Carrier, FixedPricing, FraudCheck, HttpFraudCheck, InMemoryCarrier,
    InMemoryFraudCheck, NoFraudCheck, Pricing, SimulatedPricing, WarehouseAllocator,
};
pub use shipment::{ShipmentContext, ShipmentMessage, ShipmentProcess};
