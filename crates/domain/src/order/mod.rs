//! Order aggregate and related types.

mod aggregate;
mod events;
mod fulfillment;
mod state;

use common::AggregateId;
use serde::{Deserialize, Serialize};

pub use aggregate::Order;
pub use events::{
    AllocatedFulfillment, CustomerActionReceivedData, CustomerActionRequestedData,
    FulfillmentChargedData, FulfillmentFailureData, FulfillmentLaunchedData,
    FulfillmentsAllocatedData, OrderEvent, OrderFailedData, OrderStartedData,
    ShipmentDeliveredData,
};
pub use fulfillment::{Allocation, Fulfillment};
pub use state::{CustomerAction, FulfillmentStatus, OrderStatus};

/// Final result of an order orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: AggregateId,
    pub status: OrderStatus,
}
