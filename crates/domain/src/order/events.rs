//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::billing::ChargeResult;
use crate::failure::Failure;
use crate::value_objects::{CustomerId, Item};

use super::{Allocation, CustomerAction};

/// Events recorded in an order's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// The orchestrator was started.
    OrderStarted(OrderStartedData),

    /// Items were split into fulfillments.
    FulfillmentsAllocated(FulfillmentsAllocatedData),

    /// The order reached the customer decision point.
    CustomerActionRequested(CustomerActionRequestedData),

    /// The customer decided. Only the first decision is recorded.
    CustomerActionReceived(CustomerActionReceivedData),

    /// A fulfillment's shipment and charge were started.
    FulfillmentLaunched(FulfillmentLaunchedData),

    /// Starting a fulfillment's children failed. Other fulfillments are
    /// unaffected.
    FulfillmentLaunchFailed(FulfillmentFailureData),

    /// A fulfillment's shipment was delivered.
    ShipmentDelivered(ShipmentDeliveredData),

    /// A fulfillment's shipment failed.
    FulfillmentShipmentFailed(FulfillmentFailureData),

    /// A fulfillment's billing finished, approved or declined.
    FulfillmentCharged(FulfillmentChargedData),

    /// A fulfillment's billing failed.
    FulfillmentChargeFailed(FulfillmentFailureData),

    /// The orchestrator itself could not continue.
    OrderFailed(OrderFailedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderStarted(_) => "OrderStarted",
            OrderEvent::FulfillmentsAllocated(_) => "FulfillmentsAllocated",
            OrderEvent::CustomerActionRequested(_) => "CustomerActionRequested",
            OrderEvent::CustomerActionReceived(_) => "CustomerActionReceived",
            OrderEvent::FulfillmentLaunched(_) => "FulfillmentLaunched",
            OrderEvent::FulfillmentLaunchFailed(_) => "FulfillmentLaunchFailed",
            OrderEvent::ShipmentDelivered(_) => "ShipmentDelivered",
            OrderEvent::FulfillmentShipmentFailed(_) => "FulfillmentShipmentFailed",
            OrderEvent::FulfillmentCharged(_) => "FulfillmentCharged",
            OrderEvent::FulfillmentChargeFailed(_) => "FulfillmentChargeFailed",
            OrderEvent::OrderFailed(_) => "OrderFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStartedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub items: Vec<Item>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatedFulfillment {
    pub id: AggregateId,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentsAllocatedData {
    pub fulfillments: Vec<AllocatedFulfillment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerActionRequestedData {
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerActionReceivedData {
    pub action: CustomerAction,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentLaunchedData {
    pub fulfillment_id: AggregateId,
    pub shipment_id: AggregateId,
    pub launched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentDeliveredData {
    pub fulfillment_id: AggregateId,
    pub courier_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentChargedData {
    pub fulfillment_id: AggregateId,
    pub charge: ChargeResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentFailureData {
    pub fulfillment_id: AggregateId,
    pub failure: Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailedData {
    pub failure: Failure,
    pub failed_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn order_started(order_id: AggregateId, customer_id: CustomerId, items: Vec<Item>) -> Self {
        OrderEvent::OrderStarted(OrderStartedData {
            order_id,
            customer_id,
            items,
            started_at: Utc::now(),
        })
    }

    pub fn fulfillments_allocated(fulfillments: Vec<AllocatedFulfillment>) -> Self {
        OrderEvent::FulfillmentsAllocated(FulfillmentsAllocatedData { fulfillments })
    }

    pub fn customer_action_requested() -> Self {
        OrderEvent::CustomerActionRequested(CustomerActionRequestedData {
            requested_at: Utc::now(),
        })
    }

    pub fn customer_action_received(action: CustomerAction) -> Self {
        OrderEvent::CustomerActionReceived(CustomerActionReceivedData {
            action,
            received_at: Utc::now(),
        })
    }

    pub fn fulfillment_launched(fulfillment_id: AggregateId, shipment_id: AggregateId) -> Self {
        OrderEvent::FulfillmentLaunched(FulfillmentLaunchedData {
            fulfillment_id,
            shipment_id,
            launched_at: Utc::now(),
        })
    }

    pub fn launch_failed(fulfillment_id: AggregateId, failure: Failure) -> Self {
        OrderEvent::FulfillmentLaunchFailed(FulfillmentFailureData {
            fulfillment_id,
            failure,
        })
    }

    pub fn shipment_delivered(fulfillment_id: AggregateId, courier_reference: String) -> Self {
        OrderEvent::ShipmentDelivered(ShipmentDeliveredData {
            fulfillment_id,
            courier_reference,
        })
    }

    pub fn shipment_failed(fulfillment_id: AggregateId, failure: Failure) -> Self {
        OrderEvent::FulfillmentShipmentFailed(FulfillmentFailureData {
            fulfillment_id,
            failure,
        })
    }

    pub fn fulfillment_charged(fulfillment_id: AggregateId, charge: ChargeResult) -> Self {
        OrderEvent::FulfillmentCharged(FulfillmentChargedData {
            fulfillment_id,
            charge,
        })
    }

    pub fn charge_failed(fulfillment_id: AggregateId, failure: Failure) -> Self {
        OrderEvent::FulfillmentChargeFailed(FulfillmentFailureData {
            fulfillment_id,
            failure,
        })
    }

    pub fn order_failed(failure: Failure) -> Self {
        OrderEvent::OrderFailed(OrderFailedData {
            failure,
            failed_at: Utc::now(),
        })
    }
}
