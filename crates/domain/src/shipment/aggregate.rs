//! Shipment aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::error::{DomainError, ValidationError};
use crate::failure::Failure;
use crate::value_objects::{Item, validate_items};

use super::{ShipmentEvent, ShipmentResult, ShipmentStatus};

/// One shipment, from booking through delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shipment {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_id: Option<AggregateId>,

    items: Vec<Item>,

    status: ShipmentStatus,

    updated_at: Option<DateTime<Utc>>,

    /// Set once the courier has accepted the booking.
    courier_reference: Option<String>,

    /// Stages whose notification has been sent, in order.
    notified: Vec<ShipmentStatus>,

    completed: bool,

    failure: Option<Failure>,
}

impl Aggregate for Shipment {
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "Shipment"
    }

    fn id(&self) -> Option<&AggregateId> {
        self.id.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ShipmentEvent::ShipmentStarted(data) => {
                self.id = Some(data.shipment_id);
                self.order_id = Some(data.order_id);
                self.items = data.items;
                self.status = ShipmentStatus::Booked;
                self.updated_at = Some(data.started_at);
            }
            ShipmentEvent::ShipmentBooked(data) => {
                self.courier_reference = Some(data.courier_reference);
                self.updated_at = Some(data.booked_at);
            }
            ShipmentEvent::NotificationSent(data) => {
                if !self.notified.contains(&data.stage) {
                    self.notified.push(data.stage);
                }
            }
            ShipmentEvent::StatusUpdated(data) => {
                if self.status.advances_to(data.status) {
                    self.status = data.status;
                    self.updated_at = Some(data.updated_at);
                }
            }
            ShipmentEvent::ShipmentCompleted(_) => self.completed = true,
            ShipmentEvent::ShipmentFailed(data) => self.failure = Some(data.failure),
        }
    }
}

impl SnapshotCapable for Shipment {}

// Query methods
impl Shipment {
    pub fn order_id(&self) -> Option<&AggregateId> {
        self.order_id.as_ref()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    /// When the status last changed.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn courier_reference(&self) -> Option<&str> {
        self.courier_reference.as_deref()
    }

    pub fn is_booked(&self) -> bool {
        self.courier_reference.is_some()
    }

    pub fn has_notified(&self, stage: ShipmentStatus) -> bool {
        self.notified.contains(&stage)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Returns true once the shipment completed or failed.
    pub fn is_finished(&self) -> bool {
        self.completed || self.failure.is_some()
    }

    /// The outcome of a finished shipment.
    pub fn outcome(&self) -> Option<Result<ShipmentResult, Failure>> {
        if let Some(failure) = &self.failure {
            return Some(Err(failure.clone()));
        }
        if !self.completed {
            return None;
        }
        Some(Ok(ShipmentResult {
            courier_reference: self.courier_reference.clone().unwrap_or_default(),
        }))
    }
}

// Command methods (return events)
impl Shipment {
    /// Starts tracking a shipment for the given order items.
    pub fn start(
        &self,
        shipment_id: &AggregateId,
        order_id: &AggregateId,
        items: Vec<Item>,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::AlreadyStarted {
                aggregate_type: Self::aggregate_type(),
                id: shipment_id.to_string(),
            });
        }
        if shipment_id.is_blank() {
            return Err(ValidationError::Required("ShipmentID").into());
        }
        if order_id.is_blank() {
            return Err(ValidationError::Required("OrderID").into());
        }
        validate_items(&items)?;

        Ok(vec![ShipmentEvent::shipment_started(
            shipment_id.clone(),
            order_id.clone(),
            items,
        )])
    }

    /// Applies a carrier update.
    ///
    /// Only a forward move produces an event; repeated, stale or late
    /// updates are accepted and ignored. Skipping a stage is allowed.
    pub fn update_status(&self, status: ShipmentStatus) -> Vec<ShipmentEvent> {
        if self.id.is_none() || self.is_finished() || !self.status.advances_to(status) {
            return vec![];
        }
        vec![ShipmentEvent::status_updated(status)]
    }
}
