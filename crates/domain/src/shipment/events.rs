//! Shipment domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::failure::Failure;
use crate::value_objects::Item;

use super::ShipmentStatus;

/// Events recorded in a shipment's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShipmentEvent {
    /// The shipment process was started for a fulfillment.
    ShipmentStarted(ShipmentStartedData),

    /// The courier accepted the booking.
    ShipmentBooked(ShipmentBookedData),

    /// The notification for a stage was sent.
    NotificationSent(NotificationSentData),

    /// A carrier update moved the shipment forward.
    StatusUpdated(StatusUpdatedData),

    /// Delivered and every notification sent.
    ShipmentCompleted(ShipmentCompletedData),

    /// A side effect failed; the shipment will not progress.
    ShipmentFailed(ShipmentFailedData),
}

impl DomainEvent for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentStarted(_) => "ShipmentStarted",
            ShipmentEvent::ShipmentBooked(_) => "ShipmentBooked",
            ShipmentEvent::NotificationSent(_) => "NotificationSent",
            ShipmentEvent::StatusUpdated(_) => "StatusUpdated",
            ShipmentEvent::ShipmentCompleted(_) => "ShipmentCompleted",
            ShipmentEvent::ShipmentFailed(_) => "ShipmentFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentStartedData {
    pub shipment_id: AggregateId,
    pub order_id: AggregateId,
    pub items: Vec<Item>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentBookedData {
    /// Reference the courier returned for the booking.
    pub courier_reference: String,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSentData {
    pub stage: ShipmentStatus,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdatedData {
    pub status: ShipmentStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentFailedData {
    pub failure: Failure,
    pub failed_at: DateTime<Utc>,
}

impl ShipmentEvent {
    pub fn shipment_started(shipment_id: AggregateId, order_id: AggregateId, items: Vec<Item>) -> Self {
        ShipmentEvent::ShipmentStarted(ShipmentStartedData {
            shipment_id,
            order_id,
            items,
            started_at: Utc::now(),
        })
    }

    pub fn shipment_booked(courier_reference: impl Into<String>) -> Self {
        ShipmentEvent::ShipmentBooked(ShipmentBookedData {
            courier_reference: courier_reference.into(),
            booked_at: Utc::now(),
        })
    }

    pub fn notification_sent(stage: ShipmentStatus) -> Self {
        ShipmentEvent::NotificationSent(NotificationSentData {
            stage,
            sent_at: Utc::now(),
        })
    }

    pub fn status_updated(status: ShipmentStatus) -> Self {
        ShipmentEvent::StatusUpdated(StatusUpdatedData {
            status,
            updated_at: Utc::now(),
        })
    }

    pub fn shipment_completed() -> Self {
        ShipmentEvent::ShipmentCompleted(ShipmentCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn shipment_failed(failure: Failure) -> Self {
        ShipmentEvent::ShipmentFailed(ShipmentFailedData {
            failure,
            failed_at: Utc::now(),
        })
    }
}
