//! Shipment aggregate and related types.

mod aggregate;
mod events;
mod status;

pub use aggregate::Shipment;
pub use events::{
    NotificationSentData, ShipmentBookedData, ShipmentCompletedData, ShipmentEvent,
    ShipmentFailedData, ShipmentStartedData, StatusUpdatedData,
};
pub use status::ShipmentStatus;

use serde::{Deserialize, Serialize};

/// What a delivered shipment hands back to its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentResult {
    pub courier_reference: String,
}
