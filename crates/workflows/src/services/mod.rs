//! Collaborators the processes call out to, with in-memory implementations.

pub mod allocation;
pub mod carrier;
pub mod fraud;
pub mod pricing;

pub use allocation::{Allocator, WarehouseAllocator};
pub use carrier::{Carrier, InMemoryCarrier};
pub use fraud::{
    FraudCheck, FraudCheckRequest, FraudCheckResponse, HttpFraudCheck, InMemoryFraudCheck,
    NoFraudCheck,
};
pub use pricing::{FixedPricing, Pricing, SimulatedPricing};
