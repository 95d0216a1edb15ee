//! Shipment status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Where a shipment is in its journey.
///
/// Statuses are ordered and a shipment only ever moves forward:
/// ```text
/// Booked ──► Dispatched ──► Delivered
/// ```
/// The same values name the notification stages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    /// Acknowledged by a courier, not yet picked up.
    #[default]
    Booked,

    /// Picked up by the courier, not yet delivered.
    Dispatched,

    /// Delivered to the customer (terminal).
    Delivered,
}

impl ShipmentStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered)
    }

    /// Returns true if moving to `next` is a forward transition.
    pub fn advances_to(&self, next: ShipmentStatus) -> bool {
        next > *self
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Booked => "booked",
            ShipmentStatus::Dispatched => "dispatched",
            ShipmentStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(ShipmentStatus::Booked),
            "dispatched" => Ok(ShipmentStatus::Dispatched),
            "delivered" => Ok(ShipmentStatus::Delivered),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}
