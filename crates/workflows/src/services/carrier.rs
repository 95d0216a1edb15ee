//! Carrier service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::{Item, ShipmentStatus};

use crate::error::{Result, WorkflowError};

/// Books shipments with a courier and sends the customer notifications for
/// each shipment stage.
///
/// Both calls are keyed by shipment id; implementations must treat a repeated
/// call for the same shipment as the same booking.
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Books a shipment and returns the courier's reference for it.
    async fn book_shipment(
        &self,
        shipment_id: &AggregateId,
        order_id: &AggregateId,
        items: &[Item],
    ) -> Result<String>;

    /// Notifies the customer that the shipment reached `stage`.
    async fn notify(
        &self,
        shipment_id: &AggregateId,
        order_id: &AggregateId,
        stage: ShipmentStatus,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryCarrierState {
    bookings: HashMap<AggregateId, String>,
    booking_calls: usize,
    notifications: Vec<(AggregateId, ShipmentStatus)>,
    next_id: u32,
    fail_on_book: bool,
}

/// In-memory carrier for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCarrier {
    state: Arc<RwLock<InMemoryCarrierState>>,
}

impl InMemoryCarrier {
    /// Creates a new in-memory carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the carrier to reject bookings.
    pub fn set_fail_on_book(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_book = fail;
    }

    /// Returns the number of distinct shipments booked.
    pub fn booking_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bookings
            .len()
    }

    /// Returns how many times `book_shipment` succeeded, including repeats.
    pub fn booking_calls(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .booking_calls
    }

    /// Returns the courier reference booked for a shipment.
    pub fn booking(&self, shipment_id: &AggregateId) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bookings
            .get(shipment_id)
            .cloned()
    }

    /// Returns how many notifications were sent for `stage` across all
    /// shipments.
    pub fn notification_count(&self, stage: ShipmentStatus) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .notifications
            .iter()
            .filter(|(_, sent)| *sent == stage)
            .count()
    }

    /// Returns the stages notified for one shipment, in order.
    pub fn notifications_for(&self, shipment_id: &AggregateId) -> Vec<ShipmentStatus> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .notifications
            .iter()
            .filter(|(id, _)| id == shipment_id)
            .map(|(_, stage)| *stage)
            .collect()
    }
}

#[async_trait]
impl Carrier for InMemoryCarrier {
    async fn book_shipment(
        &self,
        shipment_id: &AggregateId,
        _order_id: &AggregateId,
        _items: &[Item],
    ) -> Result<String> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_book {
            return Err(WorkflowError::side_effect(
                "book_shipment",
                "courier rejected the booking",
            ));
        }

        state.booking_calls += 1;
        if let Some(reference) = state.bookings.get(shipment_id) {
            return Ok(reference.clone());
        }

        state.next_id += 1;
        let reference = format!("COURIER-{:04}", state.next_id);
        state
            .bookings
            .insert(shipment_id.clone(), reference.clone());

        Ok(reference)
    }

    async fn notify(
        &self,
        shipment_id: &AggregateId,
        order_id: &AggregateId,
        stage: ShipmentStatus,
    ) -> Result<()> {
        tracing::info!(%shipment_id, %order_id, %stage, "Shipment notification sent");
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .notifications
            .push((shipment_id.clone(), stage));
        Ok(())
    }
}
