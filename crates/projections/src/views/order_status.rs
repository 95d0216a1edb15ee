//! Order status view.
//!
//! Unlike the event-fed views this one is assembled on demand: the order's
//! state comes from its process, and each launched fulfillment's shipment
//! status is asked of the shipment process itself.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    ChargeResult, CustomerId, Failure, FulfillmentStatus, Item, Order, OrderStatus, ShipmentStatus,
};
use event_store::EventStore;
use serde::Serialize;
use workflows::Engine;

use crate::Result;

/// Reported when a shipment's status cannot be read.
pub const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusReport {
    pub id: AggregateId,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub fulfillments: Vec<FulfillmentReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentReport {
    pub id: AggregateId,
    pub location: String,
    pub status: FulfillmentStatus,
    pub items: Vec<Item>,
    pub shipment: Option<ShipmentReport>,
    pub charge: Option<ChargeResult>,
    pub failure: Option<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentReport {
    pub id: AggregateId,
    /// A shipment status name, or `"unknown"`.
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShipmentReport {
    fn unknown(id: AggregateId) -> Self {
        Self {
            id,
            status: UNKNOWN_STATUS.to_string(),
            updated_at: None,
        }
    }

    fn known(id: AggregateId, status: ShipmentStatus, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id,
            status: status.as_str().to_string(),
            updated_at,
        }
    }
}

/// Point-in-time status of orders and their fulfillments.
pub struct OrderStatusView<S: EventStore + Clone + 'static> {
    engine: Engine<S>,
}

impl<S: EventStore + Clone + 'static> Clone for OrderStatusView<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<S: EventStore + Clone + 'static> OrderStatusView<S> {
    pub fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Reports the status of order `order_id`.
    ///
    /// Fails with the engine's `NotFound` if no such order was started.
    #[tracing::instrument(skip(self))]
    pub async fn order_status(&self, order_id: &AggregateId) -> Result<OrderStatusReport> {
        let order = self.engine.order(order_id).await?.state();

        let mut fulfillments = Vec::with_capacity(order.fulfillments().len());
        for fulfillment in order.fulfillments() {
            let shipment = match fulfillment.shipment_id() {
                Some(shipment_id) => Some(self.shipment(shipment_id).await),
                None => None,
            };
            fulfillments.push(FulfillmentReport {
                id: fulfillment.id().clone(),
                location: fulfillment.location().to_string(),
                status: order.fulfillment_status(fulfillment),
                items: fulfillment.items().to_vec(),
                shipment,
                charge: fulfillment.charge().cloned(),
                failure: fulfillment.failure().cloned(),
            });
        }

        Ok(Self::report(order_id, &order, fulfillments))
    }

    async fn shipment(&self, shipment_id: &AggregateId) -> ShipmentReport {
        match self.engine.shipment(shipment_id).await {
            Ok(handle) => {
                let shipment = handle.state();
                ShipmentReport::known(shipment_id.clone(), shipment.status(), shipment.updated_at())
            }
            Err(err) => {
                tracing::warn!(%shipment_id, error = %err, "Shipment status unavailable");
                ShipmentReport::unknown(shipment_id.clone())
            }
        }
    }

    fn report(order_id: &AggregateId, order: &Order, fulfillments: Vec<FulfillmentReport>) -> OrderStatusReport {
        OrderStatusReport {
            id: order_id.clone(),
            customer_id: order.customer_id().cloned(),
            status: order.status(),
            fulfillments,
        }
    }
}
